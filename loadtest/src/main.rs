//! The `loadtest` binary. See [`loadtest::cli`] for the available commands.

fn main() -> anyhow::Result<()> {
    loadtest::cli::execute()
}
