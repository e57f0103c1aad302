// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use tracing::error;

pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .try_init();
}

/// Reports an unrecoverable error on one line and terminates the process.
///
/// The chain is flattened with `: ` so the failing operation (the outermost
/// context) leads the message.
pub fn exit_fatal(err: &anyhow::Error) -> ! {
    error!("fatal: {}", one_line(err));
    std::process::exit(1)
}

fn one_line(err: &anyhow::Error) -> String {
    err.chain()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn diagnostic_names_outer_operation_first() {
        let err = Err::<(), _>(anyhow!("ERROR_OUT_OF_HOST_MEMORY"))
            .context("vkCreateSwapchainKHR")
            .unwrap_err();
        assert_eq!(one_line(&err), "vkCreateSwapchainKHR: ERROR_OUT_OF_HOST_MEMORY");
    }
}
