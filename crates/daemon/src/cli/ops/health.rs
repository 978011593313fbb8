use clap::Args;

use safetour_daemon::state::{AnchorConfig, ContentConfig};

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {}

fn check_line(name: &str, result: Result<reqwest::Response, reqwest::Error>) -> String {
    match result {
        Ok(resp) if resp.status().is_success() => format!("  {}: OK", name),
        Ok(resp) => format!("  {}: UNHEALTHY ({})", name, resp.status()),
        Err(_) => format!("  {}: NOT REACHABLE", name),
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = vec!["Config:".to_string()];
        match ctx.app_state() {
            Ok(state) => {
                lines.push(format!("  directory:  {}", state.state_dir.display()));
                lines.push("  config.toml: OK".to_string());
                lines.push(format!(
                    "  record key: {}",
                    match state.load_record_key() {
                        Ok(_) => "OK".to_string(),
                        Err(e) => format!("MISSING ({})", e),
                    }
                ));
                lines.push(format!("  api_port:   {}", state.config.api_port));
                lines.push(format!(
                    "  content:    {}",
                    match state.config.content {
                        ContentConfig::Memory => "memory",
                        ContentConfig::Pinning { .. } => "pinning",
                    }
                ));
                lines.push(format!(
                    "  anchors:    {}",
                    match state.config.anchor {
                        AnchorConfig::Memory => "memory",
                        AnchorConfig::Chain { .. } => "chain",
                        AnchorConfig::Remote { .. } => "remote",
                    }
                ));
            }
            Err(e) => lines.push(format!("  error: {}", e)),
        }

        let base = ctx.client.base_url();
        let client = ctx.client.http_client();
        let status_url = |check: &str| format!("{}/_status/{}", base.as_str().trim_end_matches('/'), check);

        lines.push(String::new());
        lines.push(format!("Daemon ({}):", base));
        lines.push(check_line("livez ", client.get(status_url("livez")).send().await));
        lines.push(check_line("readyz", client.get(status_url("readyz")).send().await));

        Ok(lines.join("\n"))
    }
}
