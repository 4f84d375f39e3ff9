use crate::channel::tcp::TcpChannelSettings;
use derivative::Derivative;
use serde_derive::{Deserialize, Serialize};
use tokio::time::Duration;

#[derive(Derivative, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Default)]
pub struct Server {
    #[derivative(Default(value = "\"127.0.0.1\".to_string()"))]
    pub host: String,
    #[derivative(Default(value = "8000"))]
    pub port: u16,
    #[derivative(Default(value = "5000"))]
    pub request_timeout_ms: u64,
    #[derivative(Default(value = "1000"))]
    pub reconnect_delay_ms: u64,
}

impl Server {
    pub fn channel_settings(&self) -> TcpChannelSettings {
        TcpChannelSettings {
            host: self.host.clone(),
            port: self.port,
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

/// What the board shows before the first sync
#[derive(Derivative, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Default)]
pub struct Defaults {
    #[derivative(Default(value = "\"Uccle Sport\".to_string()"))]
    pub home_team: String,
    #[derivative(Default(value = "\"Visiteurs\".to_string()"))]
    pub away_team: String,
    #[derivative(Default(value = "2100"))]
    pub remaining: u32,
}

#[derive(Derivative, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[derivative(Default)]
pub struct Config {
    pub server: Server,
    pub defaults: Defaults,
    /// Clock presets in seconds
    #[derivative(Default(value = "vec![1800, 2100, 1050]"))]
    pub presets: Vec<u32>,
    /// Slides shown between games, sent along with every full commit
    #[derivative(Default(value = "default_display_assets()"))]
    pub display_assets: Vec<String>,
}

fn default_display_assets() -> Vec<String> {
    (1..=6).map(|i| format!("/img/img{i}.png")).collect()
}
