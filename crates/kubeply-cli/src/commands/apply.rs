//! Apply commands - deploy manifests one at a time

use crate::args::DeployArgs;
use crate::commands::{deployer, show};
use crate::display::{self, SpinnerProgress};
use crate::error::Result;

/// Run `apply-all` (no names) or `apply-one` (the given names, in order)
pub async fn run(args: &DeployArgs, names: Option<Vec<String>>) -> Result<()> {
    if args.dry_run {
        let deployer = deployer(args, args.offline_bridge())?;
        let names = match names {
            Some(names) => names,
            None => deployer.names()?,
        };
        print!("{}", show::render(&deployer, &names, args.output)?);
        return Ok(());
    }

    let deployer = deployer(args, args.bridge().await?)?;
    let mut progress = SpinnerProgress::default();

    let summary = match names {
        Some(names) => {
            display::print_header("Applying", names.len());
            deployer.apply_each(&names, &mut progress).await?
        }
        None => {
            display::print_header("Applying", deployer.names()?.len());
            deployer.apply_all_with(&mut progress).await?
        }
    };

    display::print_summary(&summary);
    Ok(())
}
