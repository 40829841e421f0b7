//! Feature construction from records in their stored JSON form

use chrono::{TimeZone, Utc};
use envguard_core::{build_training_table, Parameter, Quantity, Reading};

const RECORDS: &str = r#"[
  {"timestamp":"2024-04-01T08:00:00Z","sensorId":"AIR_001","sensorType":"air",
   "readings":{"pm25":12.0,"co2":450.0,"temperature":19.5,"battery":88}},
  {"timestamp":"2024-04-01T09:00:00Z","sensorId":"WATER_001","sensorType":"water",
   "readings":{"ph":7.2,"turbidity":null,"temperature":14.0}},
  {"timestamp":"2024-04-01T10:00:00Z","sensorId":"AIR_001","sensorType":"air",
   "readings":{"pm25":null,"co2":470.0,"temperature":20.5}},
  {"timestamp":"2024-04-01T11:00:00Z","sensorId":"AIR_001","sensorType":"air",
   "readings":{"pm25":18.0,"co2":490.0}}
]"#;

fn records() -> Vec<Reading> {
    serde_json::from_str(RECORDS).unwrap()
}

#[test]
fn test_columns_from_mixed_sensor_families() {
    let table = build_training_table(&records());

    assert_eq!(table.len(), 4);
    // "battery" is not a quantity; turbidity counts because its key is present
    assert_eq!(
        table.columns(),
        &[
            Quantity::Pm25,
            Quantity::Co2,
            Quantity::Ph,
            Quantity::Turbidity,
            Quantity::Temperature
        ]
    );
    assert_eq!(table.usable_rows(Parameter::Pm25), 2);
    assert_eq!(table.usable_rows(Parameter::Turbidity), 0);
}

#[test]
fn test_design_and_inference_share_a_layout() {
    let table = build_training_table(&records());
    let design = table.design_for(Parameter::Pm25).unwrap();

    assert_eq!(
        design.layout().feature_names(),
        vec!["hour", "day_of_week", "month", "co2", "ph", "turbidity", "temperature"]
    );
    // Rows at 08:00 and 11:00; the 11:00 row lacks temperature, imputed with 19.5
    assert_eq!(design.targets(), &[12.0, 18.0]);
    assert_eq!(design.features()[1], vec![11.0, 0.0, 4.0, 490.0, 0.0, 0.0, 19.5]);

    // 2024-04-01 is a Monday; inference zero-fills what the reading lacks
    let records = records();
    let latest = &records[3];
    let at = Utc.with_ymd_and_hms(2024, 4, 1, 14, 0, 0).unwrap();
    let vector = design.layout().vector_for(Parameter::Pm25, latest, at).unwrap();
    assert_eq!(vector.as_slice(), &[14.0, 0.0, 4.0, 490.0, 0.0, 0.0, 0.0]);
}
