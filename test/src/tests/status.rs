use anyhow::ensure;
use libtest_mimic::Trial;

use crate::capabilities::Capabilities;
use crate::context::{ctx, run};

const APPS: [&str; 3] = ["dashboard", "photos", "video"];

pub fn register(caps: &Capabilities) -> Vec<Trial> {
    let http = caps.http;
    vec![
        Trial::test("status::at_most_one_app", move || {
            run(async {
                ensure!(http, "no HTTP access");
                let status = ctx().client.get_status().await?;
                ensure!(
                    status.active_scripts.len() <= 1,
                    "expected at most one app, got {:?}",
                    status.active_scripts
                );
                Ok(())
            })
        }),
        Trial::test("status::only_known_apps", move || {
            run(async {
                ensure!(http, "no HTTP access");
                let status = ctx().client.get_status().await?;
                for app in &status.active_scripts {
                    ensure!(APPS.contains(&app.as_str()), "unexpected app {app}");
                }
                Ok(())
            })
        }),
        Trial::test("status::started_at_only_when_running", move || {
            run(async {
                ensure!(http, "no HTTP access");
                let status = ctx().client.get_status().await?;
                ensure!(
                    status.active_scripts.is_empty() == status.started_at.is_none(),
                    "started_at {:?} doesn't match {:?}",
                    status.started_at,
                    status.active_scripts
                );
                Ok(())
            })
        }),
        Trial::test("status::unknown_app_start_returns_400", move || {
            run(async {
                ensure!(http, "no HTTP access");
                let before = ctx().client.active().await?;
                let (code, body) = ctx().client.start("spotify").await?;
                ensure!(code == 400, "expected 400, got {code}");
                ensure!(body.status == "error", "expected error, got {}", body.status);
                let after = ctx().client.active().await?;
                ensure!(before == after, "running app changed: {before:?} -> {after:?}");
                Ok(())
            })
        }),
        Trial::test("status::unknown_app_stop_returns_400", move || {
            run(async {
                ensure!(http, "no HTTP access");
                let resp = ctx().client.stop_raw("winamp").await?;
                ensure!(resp.status() == 400, "expected 400, got {}", resp.status());
                Ok(())
            })
        }),
    ]
}
