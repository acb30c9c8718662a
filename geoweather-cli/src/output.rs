//! Human-readable and JSON rendering of display fields.

use chrono::{DateTime, Local, Utc};
use geoweather_core::{DisplayFields, LabelSource, WeatherSnapshot, project, project_in};

pub fn print_snapshot(
    snapshot: &WeatherSnapshot,
    saved_at: Option<DateTime<Utc>>,
    region: &str,
    label_source: LabelSource,
    json: bool,
) -> anyhow::Result<()> {
    let fields = fields_for(snapshot, region, label_source);

    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
    } else {
        print!("{}", render(&fields, saved_at.map(|t| t.with_timezone(&Local))));
    }

    Ok(())
}

/// `project` keeps the mismatch warning for region labels.
fn fields_for(
    snapshot: &WeatherSnapshot,
    region: &str,
    label_source: LabelSource,
) -> DisplayFields {
    match label_source {
        LabelSource::Region => project(snapshot, region),
        LabelSource::Units => {
            let label = label_source.resolve(region, snapshot.units);
            project_in(snapshot, label, &Local)
        }
    }
}

/// Non-blocking notice on stderr; output on stdout continues.
pub fn notify(message: &str) {
    eprintln!("warning: {message}");
}

fn render(fields: &DisplayFields, saved_at: Option<DateTime<Local>>) -> String {
    let mut out = String::new();

    let place = match (fields.place.is_empty(), fields.country.is_empty()) {
        (false, false) => format!("{}, {}", fields.place, fields.country),
        (false, true) => fields.place.clone(),
        (true, false) => fields.country.clone(),
        (true, true) => "Unknown location".to_string(),
    };
    out.push_str(&format!("{place}\n"));
    out.push_str(&format!(
        "  {} ({}) [{}]\n",
        fields.condition, fields.description, fields.icon
    ));
    out.push_str(&format!("  Temperature: {}\n", fields.temperature));
    out.push_str(&format!("  Humidity:    {}\n", fields.humidity));
    out.push_str(&format!("  Wind:        {}\n", fields.wind));
    out.push_str(&format!("  Sunrise:     {}\n", fields.sunrise));
    out.push_str(&format!("  Sunset:      {}\n", fields.sunset));

    if let Some(saved_at) = saved_at {
        out.push_str(&format!(
            "  (saved {})\n",
            saved_at.format("%Y-%m-%d %H:%M")
        ));
    }

    out
}
