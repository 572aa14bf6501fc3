//! Road sign label table
//!
//! Maps the classifier's output index to a display name. The ordinals match
//! the German traffic sign benchmark layout that trained models assume.

/// Number of sign classes
pub const NUM_CLASSES: usize = 43;

/// Name returned for ids outside the table
pub const UNKNOWN_SIGN: &str = "Unknown Sign";

/// Sign names, indexed by class id
pub const SIGN_NAMES: [&str; NUM_CLASSES] = [
    "Speed limit (20km/h)",
    "Speed limit (30km/h)",
    "Speed limit (50km/h)",
    "Speed limit (60km/h)",
    "Speed limit (70km/h)",
    "Speed limit (80km/h)",
    "End of speed limit (80km/h)",
    "Speed limit (100km/h)",
    "Speed limit (120km/h)",
    "No passing",
    "No passing veh over 3.5 tons",
    "Right-of-way at intersection",
    "Priority road",
    "Yield",
    "Stop",
    "No vehicles",
    "Veh > 3.5 tons prohibited",
    "No entry",
    "General caution",
    "Dangerous curve left",
    "Dangerous curve right",
    "Double curve",
    "Bumpy road",
    "Slippery road",
    "Road narrows on the right",
    "Road work",
    "Traffic signals",
    "Pedestrians",
    "Children crossing",
    "Bicycles crossing",
    "Beware of ice/snow",
    "Wild animals crossing",
    "End speed + passing limits",
    "Turn right ahead",
    "Turn left ahead",
    "Ahead only",
    "Go straight or right",
    "Go straight or left",
    "Keep right",
    "Keep left",
    "Roundabout mandatory",
    "End of no passing",
    "End no passing veh > 3.5 tons",
];

/// Look up the display name of a class id.
///
/// Total: ids past the end of the table map to [`UNKNOWN_SIGN`]. Seeing that
/// value means the classifier output or the index computation is off.
pub fn sign_name(class_id: usize) -> &'static str {
    SIGN_NAMES.get(class_id).copied().unwrap_or(UNKNOWN_SIGN)
}

/// All names as owned strings, in ordinal order (stored in model metadata)
pub fn class_labels() -> Vec<String> {
    SIGN_NAMES.iter().map(|name| name.to_string()).collect()
}
