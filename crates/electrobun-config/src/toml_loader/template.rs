//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Electrobun IPC configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[rpc]
# max_request_time_ms = 1000   # deadline for outbound requests

[channel]
# pipe_dir = "/tmp"            # where the FIFO pairs live (default: OS temp dir)
# build_hash = "0123abcd"      # defaults to a digest of the package version

[socket]
# enabled = true
# host = "127.0.0.1"
# port = 0                     # 0 = ephemeral

[logging]
# level = "info"               # trace, debug, info, warn, error, off
"##
    .to_string()
}
