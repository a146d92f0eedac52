mod commands;
mod notify;
mod terminal;

use commands::{CommandLine, Commands, discover, scan, serve};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init_logging("info");

    match commands.command {
        Commands::Scan {
            target,
            ports,
            json,
            options,
        } => {
            if !json {
                print::banner();
                print::header("starting reconnaissance");
            }
            scan::scan(target, ports, json, options.to_config()).await
        }
        Commands::Discover { target, options } => {
            print::banner();
            print::header("getting ready for discovery");
            discover::discover(target, options.to_config()).await
        }
        Commands::Serve {
            port,
            webhook_url,
            options,
        } => {
            print::banner();
            serve::serve(port, webhook_url, options.to_config()).await
        }
    }
}
