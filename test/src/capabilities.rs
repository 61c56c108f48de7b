pub struct Capabilities {
    pub http: bool,
    /// Tests may start and stop apps, which takes over the kiosk's screen.
    pub launch: bool,
}
