use anyhow::Result;
use listing_processor::{WardStatus, update_wards_from_points};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::UpdateWardsArgs) -> Result<()> {
    let params = cli.params()?;
    let report = update_wards_from_points(&args.province_dir, &args.households, &args.pois, &params)?;

    for ward in &report.wards {
        if let WardStatus::Failed(reason) = &ward.status {
            println!("[update-wards] {}/{}: failed ({reason})", ward.district, ward.ward);
        }
    }
    for (district, reason) in &report.district_failures {
        println!("[update-wards] {district}: skipped ({reason})");
    }
    println!("[update-wards] {} of {} wards updated",
        report.wards.iter().filter(|w| w.is_updated()).count(), report.wards.len());

    Ok(())
}
