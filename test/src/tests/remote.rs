use anyhow::{bail, ensure};
use libtest_mimic::Trial;

use crate::capabilities::Capabilities;
use crate::context::{ctx, run};

pub fn register(caps: &Capabilities) -> Vec<Trial> {
    let launch = caps.http && caps.launch;
    vec![
        Trial::test("remote::start_twice_conflicts", move || {
            run(async {
                ensure!(launch, "launching not allowed, pass --launch");
                let client = &ctx().client;
                client.stop_all().await?;

                let (code, body) = client.start("dashboard").await?;
                ensure!(code == 200, "expected 200, got {code}: {}", body.message);
                ensure!(body.status == "success", "expected success, got {}", body.status);

                let (code, body) = client.start("dashboard").await?;
                ensure!(code == 409, "expected 409, got {code}");
                ensure!(body.status == "error", "expected error, got {}", body.status);

                let active = client.active().await?;
                ensure!(active.as_deref() == Some("dashboard"), "running: {active:?}");
                Ok(())
            })
        }),
        Trial::test("remote::stop_clears_status", move || {
            run(async {
                ensure!(launch, "launching not allowed, pass --launch");
                let client = &ctx().client;
                client.ensure_running("dashboard").await?;

                let (code, body) = client.stop("dashboard").await?;
                ensure!(code == 200, "expected 200, got {code}: {}", body.message);

                let status = client.get_status().await?;
                ensure!(
                    status.active_scripts.is_empty(),
                    "still running: {:?}",
                    status.active_scripts
                );
                ensure!(status.started_at.is_none(), "started_at still set");
                Ok(())
            })
        }),
        Trial::test("remote::stop_not_running_returns_404", move || {
            run(async {
                ensure!(launch, "launching not allowed, pass --launch");
                let client = &ctx().client;
                client.ensure_running("dashboard").await?;

                let (code, body) = client.stop("video").await?;
                ensure!(code == 404, "expected 404, got {code}");
                ensure!(body.status == "error", "expected error, got {}", body.status);

                let active = client.active().await?;
                ensure!(active.as_deref() == Some("dashboard"), "running: {active:?}");
                Ok(())
            })
        }),
        Trial::test("remote::legacy_names_accepted", move || {
            run(async {
                ensure!(launch, "launching not allowed, pass --launch");
                let client = &ctx().client;
                client.stop_all().await?;

                let (code, _) = client.start("rpi").await?;
                ensure!(code == 200, "expected 200, got {code}");
                let active = client.active().await?;
                ensure!(active.as_deref() == Some("dashboard"), "running: {active:?}");

                let (code, _) = client.stop("rpi").await?;
                ensure!(code == 200, "expected 200, got {code}");
                Ok(())
            })
        }),
        Trial::test("remote::switching_replaces_running_app", move || {
            run(async {
                ensure!(launch, "launching not allowed, pass --launch");
                let client = &ctx().client;
                client.ensure_running("dashboard").await?;

                for app in ["photos", "video", "dashboard"] {
                    let (code, body) = client.start(app).await?;
                    // a kiosk without the player installed reports the failure
                    let expected = match code {
                        200 => Some(app),
                        500 => None,
                        _ => bail!("starting {app} returned {code}: {}", body.message),
                    };
                    let active = client.active().await?;
                    ensure!(
                        active.as_deref() == expected,
                        "after starting {app}: running {active:?}"
                    );
                }
                client.stop_all().await
            })
        }),
    ]
}
