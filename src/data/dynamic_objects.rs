use std::str::FromStr;

use log::warn;

/// Physical properties of a breakable or movable map object, one line of `object.dat`.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicObjectData {
    pub model_name: String,
    pub mass: f32,
    pub turn_mass: f32,
    pub air_resistance: f32,
    pub elasticity: f32,
    pub buoyancy: f32,
    pub uproot_force: f32,
    pub collision_damage_multiplier: f32,
    pub collision_damage_flags: u32,
    pub collision_response_flags: u32,
    pub camera_avoid: bool,
}

fn field<'a, T: FromStr>(fields: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<T, String> {
    let value = fields.next().ok_or_else(|| format!("missing {}", what))?;
    value
        .parse()
        .map_err(|_| format!("invalid {} {:?}", what, value))
}

fn parse_line(line: &str) -> Result<DynamicObjectData, String> {
    let mut fields = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty());

    let model_name = fields
        .next()
        .ok_or_else(|| "missing model name".to_string())?
        .to_string();

    Ok(DynamicObjectData {
        model_name,
        mass: field(&mut fields, "mass")?,
        turn_mass: field(&mut fields, "turn mass")?,
        air_resistance: field(&mut fields, "air resistance")?,
        elasticity: field(&mut fields, "elasticity")?,
        buoyancy: field(&mut fields, "buoyancy")?,
        uproot_force: field(&mut fields, "uproot force")?,
        collision_damage_multiplier: field(&mut fields, "damage multiplier")?,
        collision_damage_flags: field(&mut fields, "damage flags")?,
        collision_response_flags: field(&mut fields, "response flags")?,
        camera_avoid: field::<u8>(&mut fields, "camera avoidance")? != 0,
    })
}

/// Parses the contents of `object.dat`. Lines starting with `;` are comments, malformed
/// lines are logged and skipped.
pub fn parse_dynamic_objects(text: &str) -> Vec<DynamicObjectData> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'))
        .filter_map(|line| match parse_line(line) {
            Ok(data) => Some(data),
            Err(reason) => {
                warn!("Skipping dynamic object line {:?}: {}", line, reason);
                None
            }
        })
        .collect()
}
