use crate::Reading;

const PREFIXES: [(&str, &str); 4] = [
    ("m3-lite:", "http://purl.org/iot/vocab/m3-lite#"),
    ("thingfulqu:", "http://purl.org/iot/vocab/thingful/quantitykinds#"),
    ("thingful:", "http://purl.org/iot/vocab/thingful#"),
    ("xsd:", "http://www.w3.org/2001/XMLSchema#"),
];

/// Expands a compact vocabulary term into its full IRI. Unknown prefixes are
/// returned untouched.
pub fn expand(term: &str) -> String {
    for (prefix, iri) in PREFIXES.iter() {
        if let Some(local) = term.strip_prefix(prefix) {
            return format!("{}{}", iri, local);
        }
    }
    term.to_owned()
}

/// Static description of one measurement stream of a flower power sensor
#[derive(Debug)]
pub struct ChannelDef {
    pub id: &'static str,
    pub measured_by: Option<&'static str>,
    pub quantity_kind: &'static str,
    pub domain_of_interest: &'static [&'static str],
    pub unit: Option<&'static str>,
    pub data_type: &'static str,
    value: fn(&Reading) -> Option<f64>,
}

impl ChannelDef {
    pub fn value(&self, reading: &Reading) -> Option<f64> {
        (self.value)(reading)
    }
}

fn air_temperature(r: &Reading) -> Option<f64> {
    r.air_temperature
}
fn fertilizer_level(r: &Reading) -> Option<f64> {
    r.fertilizer_level
}
fn light(r: &Reading) -> Option<f64> {
    r.light
}
fn soil_moisture(r: &Reading) -> Option<f64> {
    r.soil_moisture
}
fn calibrated_soil_moisture(r: &Reading) -> Option<f64> {
    r.calibrated_soil_moisture
}
fn water_tank_level(r: &Reading) -> Option<f64> {
    r.water_tank_level
}
fn battery_level(r: &Reading) -> Option<f64> {
    r.battery_level
}

pub static CHANNELS: [ChannelDef; 7] = [
    ChannelDef {
        id: "air_temperature",
        measured_by: Some("m3-lite:AirThermometer"),
        quantity_kind: "m3-lite:AirTemperature",
        domain_of_interest: &["m3-lite:Weather"],
        unit: Some("m3-lite:DegreeCelsius"),
        data_type: "xsd:double",
        value: air_temperature,
    },
    ChannelDef {
        id: "fertilizer_level",
        measured_by: Some("thingfulqu:FertilizerSensor"),
        quantity_kind: "thingfulqu:FertilizerLevel",
        domain_of_interest: &["m3-lite:Environment", "m3-lite:Agriculture"],
        unit: None,
        data_type: "xsd:double",
        value: fertilizer_level,
    },
    ChannelDef {
        id: "light",
        measured_by: Some("m3-lite:LightSensor"),
        quantity_kind: "m3-lite:Illuminance",
        domain_of_interest: &["m3-lite:Environment"],
        unit: Some("m3-lite:Lux"),
        data_type: "xsd:double",
        value: light,
    },
    ChannelDef {
        id: "soil_moisture",
        measured_by: Some("m3-lite:SoilHumiditySensor"),
        quantity_kind: "m3-lite:SoilHumidity",
        domain_of_interest: &["m3-lite:Environment", "m3-lite:Agriculture"],
        unit: Some("m3-lite:Percent"),
        data_type: "xsd:double",
        value: soil_moisture,
    },
    ChannelDef {
        id: "calibrated_soil_moisture",
        measured_by: Some("m3-lite:SoilHumiditySensor"),
        quantity_kind: "m3-lite:SoilHumidity",
        domain_of_interest: &["m3-lite:Environment", "m3-lite:Agriculture"],
        unit: Some("m3-lite:Percent"),
        data_type: "xsd:double",
        value: calibrated_soil_moisture,
    },
    ChannelDef {
        id: "water_tank_level",
        measured_by: Some("thingfulqu:WaterLevelSensor"),
        quantity_kind: "m3-lite:WaterLevel",
        domain_of_interest: &["m3-lite:Environment"],
        unit: Some("m3-lite:Percent"),
        data_type: "xsd:double",
        value: water_tank_level,
    },
    ChannelDef {
        id: "battery_level",
        measured_by: None,
        quantity_kind: "m3-lite:BatteryLevel",
        domain_of_interest: &["m3-lite:EnergyDOI"],
        unit: Some("m3-lite:Percent"),
        data_type: "xsd:double",
        value: battery_level,
    },
];

/// Shortest decimal representation, e.g. `21.5` or `97`
pub fn format_value(value: f64) -> String {
    value.to_string()
}
