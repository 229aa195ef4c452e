//! English and Spanish UI text, looked up by flat string keys.

use std::collections::HashMap;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    En,
    Es,
}

impl Lang {
    pub const ALL: [Self; 2] = [Self::En, Self::Es];

    /// Parse a language tag such as `en`, `es-CL` or `ES_es`. Anything that
    /// is not Spanish falls back to English.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match primary.as_str() {
            "es" => Self::Es,
            _ => Self::En,
        }
    }

    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
        }
    }

    /// Name of the language in itself, for the language picker.
    #[must_use]
    pub const fn native_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Es => "Español",
        }
    }
}

type Table = HashMap<&'static str, &'static str>;

static EN: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("app.title", "Patagon Measure"),
        ("panel.heading", "Measure"),
        ("panel.view", "View"),
        ("panel.wireframe", "wireframe"),
        ("panel.grid", "grid"),
        ("panel.load_model", "load model"),
        ("panel.demo_room", "demo room"),
        ("panel.language", "Language"),
        ("panel.project", "Project"),
        ("panel.points", "Points picked"),
        ("view.front", "Front"),
        ("view.top", "Top"),
        ("view.side", "Side"),
        ("view.reset", "Reset"),
        ("mode.idle", "Idle"),
        ("mode.distance", "Distance"),
        ("mode.height", "Height"),
        ("mode.area", "Area"),
        ("mode.calibrate", "Calibrate"),
        ("hint.idle", "Pick a tool to start measuring"),
        ("hint.distance", "Click two points"),
        ("hint.height", "Click a low and a high point"),
        ("hint.area", "Click the corners, then click the first point again to close"),
        ("hint.calibrate", "Click both ends of something you know the length of"),
        ("calibration.heading", "Calibration"),
        ("calibration.known", "Known length (ft)"),
        ("calibration.apply", "apply"),
        ("calibration.reset", "reset"),
        ("calibration.scale", "Feet per scene unit"),
        ("calibration.done", "Calibration updated"),
        ("list.heading", "Measurements"),
        ("list.empty", "No measurements yet"),
        ("list.rename", "rename"),
        ("list.save", "save"),
        ("list.delete", "delete"),
        ("list.clear", "clear all"),
        ("list.export", "export"),
        ("list.total_area", "Total area"),
        ("list.total_linear", "Total linear"),
        ("notice.saved", "Measurement saved"),
        ("notice.exported", "Report exported"),
        ("notice.cleared", "All measurements cleared"),
        ("notice.deleted", "Measurement deleted"),
        ("notice.model_loaded", "Model loaded"),
        ("error.invalid_input", "Invalid input"),
        ("error.empty_state", "Nothing to do"),
        ("error.persistence_read", "Saved data could not be read"),
        ("error.storage", "Could not save"),
        ("error.model", "Could not load model"),
    ])
});

static ES: Lazy<Table> = Lazy::new(|| {
    HashMap::from([
        ("panel.heading", "Medir"),
        ("panel.view", "Vista"),
        ("panel.wireframe", "alambre"),
        ("panel.grid", "cuadrícula"),
        ("panel.load_model", "cargar modelo"),
        ("panel.demo_room", "sala de ejemplo"),
        ("panel.language", "Idioma"),
        ("panel.project", "Proyecto"),
        ("panel.points", "Puntos marcados"),
        ("view.front", "Frente"),
        ("view.top", "Planta"),
        ("view.side", "Lado"),
        ("view.reset", "Restablecer"),
        ("mode.idle", "Inactivo"),
        ("mode.distance", "Distancia"),
        ("mode.height", "Altura"),
        ("mode.area", "Área"),
        ("mode.calibrate", "Calibrar"),
        ("hint.idle", "Elige una herramienta para medir"),
        ("hint.distance", "Haz clic en dos puntos"),
        ("hint.height", "Haz clic en un punto bajo y uno alto"),
        ("hint.area", "Haz clic en las esquinas y luego otra vez en el primer punto para cerrar"),
        ("hint.calibrate", "Haz clic en los extremos de algo cuyo largo conozcas"),
        ("calibration.heading", "Calibración"),
        ("calibration.known", "Largo conocido (pies)"),
        ("calibration.apply", "aplicar"),
        ("calibration.reset", "restablecer"),
        ("calibration.scale", "Pies por unidad de escena"),
        ("calibration.done", "Calibración actualizada"),
        ("list.heading", "Mediciones"),
        ("list.empty", "Aún no hay mediciones"),
        ("list.rename", "renombrar"),
        ("list.save", "guardar"),
        ("list.delete", "eliminar"),
        ("list.clear", "borrar todo"),
        ("list.export", "exportar"),
        ("list.total_area", "Área total"),
        ("list.total_linear", "Total lineal"),
        ("notice.saved", "Medición guardada"),
        ("notice.exported", "Informe exportado"),
        ("notice.cleared", "Mediciones borradas"),
        ("notice.deleted", "Medición eliminada"),
        ("notice.model_loaded", "Modelo cargado"),
        ("error.invalid_input", "Entrada no válida"),
        ("error.empty_state", "Nada que hacer"),
        ("error.persistence_read", "No se pudieron leer los datos guardados"),
        ("error.storage", "No se pudo guardar"),
        ("error.model", "No se pudo cargar el modelo"),
    ])
});

/// Look up `key` in `lang`, then in English, then give back the key itself.
#[must_use]
pub fn tr<'a>(lang: Lang, key: &'a str) -> &'a str {
    let table = match lang {
        Lang::En => &*EN,
        Lang::Es => &*ES,
    };
    let found: Option<&'a str> = table.get(key).or_else(|| EN.get(key)).copied();
    found.unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag() {
        assert_eq!(Lang::from_tag("es"), Lang::Es);
        assert_eq!(Lang::from_tag("es-CL"), Lang::Es);
        assert_eq!(Lang::from_tag("ES_es"), Lang::Es);
        assert_eq!(Lang::from_tag("en-US"), Lang::En);
        assert_eq!(Lang::from_tag("fr"), Lang::En);
        assert_eq!(Lang::from_tag(""), Lang::En);
    }

    #[test]
    fn test_lookup() {
        assert_eq!(tr(Lang::En, "mode.area"), "Area");
        assert_eq!(tr(Lang::Es, "mode.area"), "Área");
    }

    #[test]
    fn test_fallbacks() {
        // the product name is only in the English table
        assert_eq!(tr(Lang::Es, "app.title"), "Patagon Measure");
        assert_eq!(tr(Lang::Es, "no.such.key"), "no.such.key");
        assert_eq!(tr(Lang::En, "no.such.key"), "no.such.key");
    }

    #[test]
    fn test_tags_roundtrip() {
        for lang in Lang::ALL {
            assert_eq!(Lang::from_tag(lang.tag()), lang);
        }
    }
}
