pub const KEY_VALUE_TABLE_NAME: &str = "KeyValue";
pub const KEY: &str = "key";
pub const VALUE: &str = "value";

pub const TRACKS_KEY: &str = "tracks";
pub const COLORS_KEY: &str = "colors";
pub const LAYERS_KEY: &str = "layers";
pub const BOUNDS_KEY: &str = "bounds";
pub const SETTINGS_KEY: &str = "settings";
