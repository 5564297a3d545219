#![allow(dead_code)]

pub mod mock_channel;
pub mod mock_model;

use lenspanel::panel::{Panel, PanelHandle, PanelStatus};
use lenspanel::prompt::{ModelCapabilities, Sampling};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use mock_channel::MockChannel;
pub use mock_model::MockModel;

pub fn caps() -> ModelCapabilities {
    ModelCapabilities {
        default_temperature: 1.0,
        default_top_k: 3,
        max_top_k: 8,
    }
}

pub fn sliders() -> Sampling {
    Sampling {
        temperature: 0.7,
        top_k: 2,
    }
}

/// Panel over `model` with fixed sliders, exporting into `export_dir`
pub fn panel_with(model: &MockModel, export_dir: PathBuf) -> Panel {
    Panel::new(Arc::new(model.clone()), sliders(), export_dir)
}

pub fn at(secs: i64) -> chrono::DateTime<chrono::Utc> {
    use chrono::TimeZone;
    chrono::Utc
        .timestamp_opt(1_700_000_000 + secs, 0)
        .single()
        .expect("valid timestamp")
}

/// Wait until the panel publishes a status accepted by `done`
pub async fn wait_for_status(
    handle: &PanelHandle,
    done: impl Fn(&PanelStatus) -> bool,
) -> PanelStatus {
    let mut rx = handle.subscribe();
    let wait = async move {
        loop {
            {
                let status = rx.borrow_and_update();
                if done(&status) {
                    return status.clone();
                }
            }
            rx.changed().await.expect("panel task stopped");
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait)
        .await
        .expect("timed out waiting for panel status")
}
