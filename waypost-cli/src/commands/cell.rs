//! Cell key inspection.

use std::error::Error;

use clap::Args;

use waypost::config::{DEFAULT_DISCOVERY_RADIUS_MILES, DEFAULT_LOOKUP_PRECISION};
use waypost::geocell;

/// Arguments for the `cell` command.
#[derive(Args)]
pub struct CellArgs {
    /// Latitude in decimal degrees
    pub lat: f64,

    /// Longitude in decimal degrees
    pub lon: f64,

    /// Cell key precision in characters
    #[arg(long, default_value_t = DEFAULT_LOOKUP_PRECISION)]
    pub precision: usize,
}

/// Runs the `cell` command.
pub fn cell(args: CellArgs) -> Result<(), Box<dyn Error>> {
    let key = geocell::encode(args.lat, args.lon, args.precision)?;
    let (center_lat, center_lon) = geocell::decode(&key)?;
    let bbox = geocell::bounding_box(args.lat, args.lon, DEFAULT_DISCOVERY_RADIUS_MILES)?;

    println!("Cell key:  {}", key);
    println!("Center:    ({:.6}, {:.6})", center_lat, center_lon);
    println!("Discovery: {}", bbox);
    println!("Neighbors:");
    for neighbor in geocell::neighbors(&key)? {
        println!("  {}", neighbor);
    }

    Ok(())
}
