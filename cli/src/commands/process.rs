use anyhow::Result;
use listing_processor::{DistrictProcessor, WardStatus};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::ProcessArgs) -> Result<()> {
    let params = cli.params()?;
    let mut processor = DistrictProcessor::new(&args.raw_csv, &args.district_dir, &params);
    if let Some(district) = &args.district {
        processor = processor.with_district(district);
    }

    let report = processor.run()?;

    println!("[process] {} records, {} without coordinates", report.records, report.dropped_missing_coordinates);
    println!("[process] {} dwellings, {} POIs", report.dwellings, report.pois);
    for ward in &report.wards {
        match &ward.status {
            WardStatus::Updated(merge) => println!("[process] {}: {} of {} EAs updated", ward.ward, merge.merged_units, merge.boundary_units),
            WardStatus::Failed(reason) => println!("[process] {}: failed ({reason})", ward.ward),
        }
    }

    Ok(())
}
