use anyhow::Result;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::ParamsArgs) -> Result<()> {
    cli.params()?.to_json_file(&args.output)?;
    println!("[params] wrote {}", args.output.display());
    Ok(())
}
