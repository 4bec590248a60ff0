use geoblock::{filter_records, reduce, total_size, CountryCode, GeoCsvReader};

fn main() {
    println!("Simple geoblock usage example\n");

    // Ranges as they appear in a geolocation database
    let test_ranges = vec![
        ("10.0.0.0", "10.0.0.0"),     // single address
        ("10.0.0.0", "10.0.0.3"),     // aligned, one block
        ("10.0.0.1", "10.0.0.3"),     // misaligned, two blocks
        ("1.0.1.0", "1.0.3.255"),     // typical DB1 row
        ("0.0.0.1", "255.255.255.254"), // worst case
    ];

    println!("Reducing ranges to CIDR blocks:\n");
    for (start, end) in test_ranges {
        match reduce(start, end) {
            Ok(blocks) => {
                let shown: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
                println!(
                    "{} - {} -> {} block(s), {} IPs",
                    start,
                    end,
                    blocks.len(),
                    total_size(&blocks)
                );
                if blocks.len() <= 4 {
                    println!("    {}", shown.join(" "));
                }
            }
            Err(e) => println!("{} - {} -> {}", start, end, e),
        }
    }

    // Filtering a small in-memory database
    let database = "\
\"16777216\",\"16777471\",\"US\",\"United States of America\"
\"16777472\",\"16778239\",\"CN\",\"China\"
\"16778240\",\"16779263\",\"AU\",\"Australia\"
\"16779264\",\"16781311\",\"CN\",\"China\"
";
    let wanted = [CountryCode::parse("cn").unwrap()];

    println!("\nRows attributed to {}:\n", wanted[0]);
    let mut total = 0;
    for matched in filter_records(GeoCsvReader::from_reader(database.as_bytes()), &wanted) {
        let matched = matched.unwrap();
        for block in &matched.blocks {
            println!("  {}", block);
        }
        total = matched.running_total;
    }
    println!("\n  Total IPs: {}", total);
}
