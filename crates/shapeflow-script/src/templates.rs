//! Starter programs shown when a level is opened.

/// Level id and starter program, in level order.
pub const TEMPLATES: &[(&str, &str)] = &[
    (
        "basics_01",
        r#"# Level 1: meet the factory
# A source that spawns white circles
source = Source("circle", "white")

# Finished shapes are delivered here
output = Output()

# Wire the source to the output
source.connect(output)
"#,
    ),
    (
        "basics_02",
        r#"# Level 2: painting
source = Source("circle", "white")

# Paint every shape red
painter = Painter("red")

output = Output()

source.connect(painter)
painter.connect(output)
"#,
    ),
    (
        "basics_03",
        r#"# Level 3: rotation
# A source that spawns blue triangles
source = Source("triangle", "blue")

# Turn each shape 90 degrees
rotator = Rotator(90)

output = Output()

source.connect(rotator)
rotator.connect(output)
"#,
    ),
];

/// Used for levels without a dedicated starter program.
pub const FALLBACK_TEMPLATE: &str = r#"# Write your factory here
# Example:
# source = Source("circle", "white")
# output = Output()
# source.connect(output)
"#;

pub fn template(level_id: &str) -> &'static str {
    TEMPLATES
        .iter()
        .find(|(id, _)| *id == level_id)
        .map_or(FALLBACK_TEMPLATE, |(_, src)| src)
}
