use anyhow::Result;
use listing_processor::assemble_and_save;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::IngestArgs) -> Result<()> {
    let params = cli.params()?;
    let report = assemble_and_save(&args.tab_dir, &args.out_csv, &params.survey)?;

    println!("[ingest] wrote {} rows to {} ({} interviews, {} additional structures)",
        report.rows, args.out_csv.display(), report.interviews, report.additional_structures);

    Ok(())
}
