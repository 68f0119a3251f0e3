//! Plain-text rendering of a [`DashboardSnapshot`].

use litter_map_attribution::snapshot::DashboardSnapshot;

/// Prints the KPI block, ranking table, top-region confidence, and map
/// settings.
pub fn print_snapshot(snapshot: &DashboardSnapshot) {
    let kpis = &snapshot.kpis;

    println!();
    println!("{}", snapshot.title);
    println!("{}", "=".repeat(snapshot.title.chars().count().max(40)));
    println!(
        "Confidence >= {:.2}   regions by '{}'",
        snapshot.confidence_threshold, snapshot.region_column
    );
    println!();
    println!("{:<28} {:>12}", "Total detections", kpis.total_detections);
    println!("{:<28} {:>12}", "Filtered detections", kpis.filtered_detections);
    println!(
        "{:<28} {:>11.1}%",
        format!("Top {} concentration", kpis.top_n),
        kpis.top_n_concentration_percent
    );
    println!("{:<28} {:>9.2} km²", "Mapped area", kpis.mapped_area_km2);

    for message in &snapshot.messages {
        println!();
        println!("  {message}");
    }

    if !snapshot.ranking.is_empty() {
        println!();
        println!("{:>4}  {:<32} {:>8} {:>8}", "#", "REGION", "COUNT", "%");
        println!("{}", "-".repeat(56));
        for entry in &snapshot.ranking {
            println!(
                "{:>4}  {:<32} {:>8} {:>7.1}%",
                entry.rank, entry.region_name, entry.count, entry.percent_of_filtered_total
            );
        }
        if snapshot.ranking_truncated {
            println!("  ...");
        }
    }

    if !snapshot.top_region_confidence.is_empty() {
        println!();
        println!("Mean confidence, top {} regions:", kpis.top_n);
        for region in &snapshot.top_region_confidence {
            println!(
                "  {:<32} {:.3} ({} detections)",
                region.region_name, region.mean_confidence, region.count
            );
        }
    }

    let map = &snapshot.map;
    let layers: Vec<String> = map.layers.iter().map(ToString::to_string).collect();
    println!();
    println!(
        "Map: centre {:.5}, {:.5} zoom {} | {} ({}) | layers: {}",
        map.view.center.lat,
        map.view.center.lon,
        map.view.zoom,
        map.basemap,
        map.tiles,
        if layers.is_empty() {
            "none".to_string()
        } else {
            layers.join(", ")
        }
    );
}
