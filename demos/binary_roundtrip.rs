use std::collections::HashMap;
use std::path::PathBuf;

use tellog::{OutputMode, Record, RecordReader, TelemetryLogger, ValueKind};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = PathBuf::from("./demo_data/roundtrip.rrd");
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut logger = TelemetryLogger::new();
    let series = [
        ("battery_level", "V", ValueKind::Numeric),
        ("motor_temp", "C", ValueKind::Numeric),
        ("status", "", ValueKind::Text),
    ];
    for (name, unit, kind) in series {
        logger.declare(name, unit, kind)?;
    }

    println!("Logging 20 values before any sink is attached...");
    for i in 0..10 {
        logger.log("battery_level", 30.0 - f64::from(i) * 0.1)?;
        logger.log("motor_temp", 40.0 + f64::from(i) * 0.7)?;
    }
    logger.log("status", "nominal")?;
    println!("Buffered: {}", logger.buffered_len());

    logger.attach_file(&path, OutputMode::Binary)?;
    logger.log("status", "shutdown")?;
    logger.detach_file();

    let bytes = std::fs::read(&path)?;
    println!("Wrote {} bytes to {:?}", bytes.len(), path);

    let mut reader = RecordReader::new(&bytes);
    for (name, _, kind) in series {
        reader = reader.with_kind(name, kind);
    }

    let mut per_series: HashMap<String, usize> = HashMap::new();
    for record in reader.by_ref() {
        match record? {
            Record::Declaration(d) => {
                println!("Series '{}' (ID: {}, Unit: {}, Start time: {})", d.name, d.id, d.unit, d.registered_at)
            }
            Record::Value(v) => *per_series.entry(v.series).or_default() += 1,
        }
    }
    println!("Decoded {} of {} bytes", reader.position(), bytes.len());
    let mut counts: Vec<_> = per_series.into_iter().collect();
    counts.sort();
    for (name, n) in counts {
        println!("  {}: {} values", name, n);
    }
    Ok(())
}
