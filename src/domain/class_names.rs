// ============================================================
// Layer 3 — Label Taxonomy
// ============================================================
// Training label names of the NYU-Depth-v2 40-class split,
// indexed by class id. Spellings follow the dataset release
// ("refridgerator" included) so configured OOD class names
// match what the dataset ships.

pub const NYU40_CLASS_NAMES: [&str; 40] = [
    "wall", "floor", "cabinet", "bed", "chair",
    "sofa", "table", "door", "window", "bookshelf",
    "picture", "counter", "blinds", "desk", "shelves",
    "curtain", "dresser", "pillow", "mirror", "floor mat",
    "clothes", "ceiling", "books", "refridgerator", "television",
    "paper", "towel", "shower curtain", "box", "whiteboard",
    "person", "night stand", "toilet", "sink", "lamp",
    "bathtub", "bag", "otherstructure", "otherfurniture", "otherprop",
];

/// Default out-of-distribution classes held out of training.
pub const DEFAULT_OOD_CLASSES: [&str; 3] = ["pillow", "refridgerator", "television"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ood_classes_are_known() {
        for name in DEFAULT_OOD_CLASSES {
            assert!(NYU40_CLASS_NAMES.contains(&name), "{name} missing from taxonomy");
        }
        assert_eq!(NYU40_CLASS_NAMES[24], "television");
    }
}
