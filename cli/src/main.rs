mod commands;
mod terminal;

use commands::{CommandLine, list, once, watch};
use lookout_core::Supervisor;
use terminal::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging(commands.verbose);

    let cfg = commands.config();
    let registry = lookout_plugins::registry();

    if commands.list {
        list::list(&registry, &cfg);
        return Ok(());
    }

    let supervisor = Supervisor::new(registry, cfg);

    if commands.once {
        once::once(&supervisor).await
    } else {
        watch::watch(&supervisor).await
    }
}
