use std::path::Path;

use controlino_link::LinkConfig;
use tracing::debug;

use crate::exit::{io_error, CliError, CliResult, DATA_INVALID};

/// Load the link configuration from a JSON file, or the defaults when no
/// file is given. Missing keys take their default values.
pub fn load(path: Option<&Path>) -> CliResult<LinkConfig> {
    let Some(path) = path else {
        return Ok(LinkConfig::default());
    };

    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("reading {}", path.display()), err))?;
    let config: LinkConfig = serde_json::from_str(&text).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("invalid config {}: {err}", path.display()),
        )
    })?;

    debug!(
        path = %path.display(),
        data_packet_rate_hz = config.data_packet_rate_hz,
        reply_queue_capacity = config.reply_queue_capacity,
        max_packet_size = config.frame.max_packet_size,
        "loaded link config"
    );
    Ok(config)
}
