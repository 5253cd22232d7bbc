//! Alarm code translations
//!
//! Static tables keyed by a coarse language prefix: a configured language
//! starting with "de" selects the German table, everything else English.
//! Unknown codes fall back to the raw code name.

/// Display language for alarm texts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    De,
}

impl Language {
    /// Select a language from a configured tag ("en", "de", "de-CH", ...)
    pub fn from_tag(tag: &str) -> Self {
        if tag.starts_with("de") {
            Language::De
        } else {
            Language::En
        }
    }
}

/// Translate an alarm code name for display.
///
/// Pure lookup; unknown codes return the input name unchanged.
pub fn translate_code<'a>(code: &'a str, language: Language) -> &'a str {
    let text = match language {
        Language::En => translate_en(code),
        Language::De => translate_de(code),
    };
    text.unwrap_or(code)
}

fn translate_en(code: &str) -> Option<&'static str> {
    Some(match code {
        "UNKNOWN" => "Unknown error",
        "OFFLINE_MOTOR_1" => "Motor 1 offline",
        "OFFLINE_MOTOR_2" => "Motor 2 offline",
        "OFFLINE_MOTOR_BLEND" => "Blend motor offline",
        "REGENERATIV_20" => "Regeneration salt level < 20%",
        "OVERCURRENT_MOTOR_1" => "Overcurrent motor 1",
        "OVERCURRENT_MOTOR_2" => "Overcurrent motor 2",
        "OVERCURRENT_MOTOR_3" => "Overcurrent motor 3",
        "OVERCURRENT_VALVE" => "Overcurrent valve",
        "STOP_VOLUME" => "Stop volume",
        "STOP_SENSOR" => "Stop sensor",
        "CONSTANT_FLOW" => "Constant flow",
        "LOW_PRESSURE" => "Low pressure",
        "PISTON_POSITION" => "Piston position",
        "ELECTRONIC" => "Electronic",
        "INSUFFICIENT_REGENERATIV" => "Insufficient regeneration salt",
        "STOP_WIRELESS_SENSOR" => "Stop wireless sensor",
        "REGENERATIV_0" => "Regeneration salt empty",
        "MAINTENANCE_CUSTOMER" => "Routine maintenance due",
        "INSPECTION_CUSTOMER" => "Customer inspection required",
        "MAINTENANCE_SERVICE" => "Technician maintenance due",
        "MINERALS_LOW" => "Minerals low",
        "MINERALS_0" => "Minerals empty",
        "OVERCURRENT_VALVE_1" => "Overcurrent valve 1",
        "OVERCURRENT_VALVE_2" => "Overcurrent valve 2",
        "OVERCURRENT_DOSING" => "Overcurrent dosing",
        "OVERCURRENT_VALVE_BALL" => "Overcurrent ball valve",
        "METER_NOT_COUNTING" => "Water meter not counting",
        "REGENERATION_DRAIN" => "Regeneration drain issue",
        "INIT_PCB_0" => "PCB initialization 0",
        "INIT_PCB_1" => "PCB initialization 1",
        "POSITION_MOTOR_1" => "Motor 1 position",
        "POSITION_MOTOR_2" => "Motor 2 position",
        "CONDUCTIVITY_HIGH" => "Conductivity too high",
        "CONDUCTIVITY_LIMIT_1" => "Conductivity limit 1 exceeded",
        "CONDUCTIVITY_LIMIT_2" => "Conductivity limit 2 exceeded",
        "CONDUCTIVITY_LIMIT_WATER" => "Water conductivity limit exceeded",
        "NO_FUNCTION" => "No function",
        "TEMPERATURE_DISCONNECTED" => "Temperature sensor disconnected",
        "TEMPERATURE_HIGH" => "Temperature too high",
        "OFFLINE_VALVE_BALL" => "Ball valve offline",
        "EXTERNAL_FILTER_CHANGE" => "External filter change required",
        "BRINE_UNSATURATED" => "Brine unsaturated",
        "DOSING_FAULT" => "Dosing fault",
        _ => return None,
    })
}

fn translate_de(code: &str) -> Option<&'static str> {
    Some(match code {
        "UNKNOWN" => "Unbekannter Fehler",
        "OFFLINE_MOTOR_1" => "Motor 1 offline",
        "OFFLINE_MOTOR_2" => "Motor 2 offline",
        "OFFLINE_MOTOR_BLEND" => "Mischmotor offline",
        "REGENERATIV_20" => "Regeneriersalz-Stand < 20%",
        "OVERCURRENT_MOTOR_1" => "Überstrom Motor 1",
        "OVERCURRENT_MOTOR_2" => "Überstrom Motor 2",
        "OVERCURRENT_MOTOR_3" => "Überstrom Motor 3",
        "OVERCURRENT_VALVE" => "Überstrom Ventil",
        "STOP_VOLUME" => "Volumen-Stopp",
        "STOP_SENSOR" => "Sensor-Stopp",
        "CONSTANT_FLOW" => "Konstanter Durchfluss",
        "LOW_PRESSURE" => "Niedriger Druck",
        "PISTON_POSITION" => "Kolbenposition",
        "ELECTRONIC" => "Elektronik",
        "INSUFFICIENT_REGENERATIV" => "Unzureichendes Regeneriersalz",
        "STOP_WIRELESS_SENSOR" => "Funk-Sensor-Stopp",
        "REGENERATIV_0" => "Regeneriersalz leer",
        "MAINTENANCE_CUSTOMER" => "Planmäßige Wartung fällig",
        "INSPECTION_CUSTOMER" => "Kundeninspektion erforderlich",
        "MAINTENANCE_SERVICE" => "Technikerwartung fällig",
        "MINERALS_LOW" => "Mineralien niedrig",
        "MINERALS_0" => "Mineralien leer",
        "OVERCURRENT_VALVE_1" => "Überstrom Ventil 1",
        "OVERCURRENT_VALVE_2" => "Überstrom Ventil 2",
        "OVERCURRENT_DOSING" => "Überstrom Dosierung",
        "OVERCURRENT_VALVE_BALL" => "Überstrom Kugelventil",
        "METER_NOT_COUNTING" => "Wasserzähler zählt nicht",
        "REGENERATION_DRAIN" => "Regenerationsabfluss-Problem",
        "INIT_PCB_0" => "Leiterplatten-Initialisierung 0",
        "INIT_PCB_1" => "Leiterplatten-Initialisierung 1",
        "POSITION_MOTOR_1" => "Position Motor 1",
        "POSITION_MOTOR_2" => "Position Motor 2",
        "CONDUCTIVITY_HIGH" => "Leitfähigkeit zu hoch",
        "CONDUCTIVITY_LIMIT_1" => "Leitfähigkeitsgrenze 1 überschritten",
        "CONDUCTIVITY_LIMIT_2" => "Leitfähigkeitsgrenze 2 überschritten",
        "CONDUCTIVITY_LIMIT_WATER" => "Wasser-Leitfähigkeitsgrenze überschritten",
        "NO_FUNCTION" => "Keine Funktion",
        "TEMPERATURE_DISCONNECTED" => "Temperatursensor getrennt",
        "TEMPERATURE_HIGH" => "Temperatur zu hoch",
        "OFFLINE_VALVE_BALL" => "Kugelventil offline",
        "EXTERNAL_FILTER_CHANGE" => "Externer Filterwechsel erforderlich",
        "BRINE_UNSATURATED" => "Sole ungesättigt",
        "DOSING_FAULT" => "Dosierfehler",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_from_tag() {
        assert_eq!(Language::from_tag("en"), Language::En);
        assert_eq!(Language::from_tag("en-US"), Language::En);
        assert_eq!(Language::from_tag("de"), Language::De);
        assert_eq!(Language::from_tag("de-CH"), Language::De);
        assert_eq!(Language::from_tag("fr"), Language::En);
    }

    #[test]
    fn test_translate_known_codes() {
        assert_eq!(translate_code("STOP_VOLUME", Language::En), "Stop volume");
        assert_eq!(translate_code("STOP_VOLUME", Language::De), "Volumen-Stopp");
        assert_eq!(
            translate_code("REGENERATIV_20", Language::En),
            "Regeneration salt level < 20%"
        );
    }

    #[test]
    fn test_translate_unknown_falls_back_to_name() {
        assert_eq!(translate_code("ERROR_200", Language::En), "ERROR_200");
        assert_eq!(translate_code("ERROR_200", Language::De), "ERROR_200");
    }
}
