use anyhow::Result;
use listing_processor::extract_structures;

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::ExtractArgs) -> Result<()> {
    let params = cli.params()?;
    let report = extract_structures(&args.csv, &args.out_dir, &params.coordinate_fixes, &params.extract)?;

    println!("[extract] {} households, {} POIs from {} records ({} without coordinates)",
        report.households, report.pois, report.records, report.dropped_missing_coordinates);

    Ok(())
}
