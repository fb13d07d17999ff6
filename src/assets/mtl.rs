//! Wavefront MTL parsing

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::assets::loader::AssetError;
use crate::renderer::MaterialDesc;

/// Parse MTL source text into named material descriptions
///
/// Only the fields a material sets are filled in; the rest stay `None` and
/// take defaults when the material is resolved.
///
/// # Errors
///
/// Returns [`AssetError::Parse`] with the 1-based line number for malformed
/// numbers or a property before any `newmtl`.
pub fn parse_mtl(source: &str) -> Result<FxHashMap<String, MaterialDesc>, AssetError> {
    let mut materials = FxHashMap::default();
    let mut current: Option<(String, MaterialDesc)> = None;

    for (index, raw) in source.lines().enumerate() {
        let line_number = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (keyword, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        if keyword == "newmtl" {
            if let Some((name, desc)) = current.take() {
                materials.insert(name, desc);
            }
            current = Some((rest.to_string(), MaterialDesc::default()));
            continue;
        }

        let Some((_, desc)) = current.as_mut() else {
            return Err(AssetError::Parse {
                line: line_number,
                message: format!("'{}' before newmtl", keyword),
            });
        };

        match keyword {
            "Ka" => desc.ambient = Some(parse_color(rest, line_number)?),
            "Kd" => desc.diffuse = Some(parse_color(rest, line_number)?),
            "Ks" => desc.specular = Some(parse_color(rest, line_number)?),
            "Ke" => desc.emissive = Some(parse_color(rest, line_number)?),
            "Ns" => desc.shininess = Some(parse_scalar(rest, line_number)?),
            "d" => desc.opacity = Some(parse_scalar(rest, line_number)?),
            "map_Kd" => desc.diffuse_map = Some(rest.to_string()),
            "map_Ns" => desc.specular_map = Some(rest.to_string()),
            "illum" | "Ni" | "Tr" | "Tf" => {}
            _ => log::warn!("MTL line {}: unhandled keyword '{}'", line_number, keyword),
        }
    }

    if let Some((name, desc)) = current {
        materials.insert(name, desc);
    }
    Ok(materials)
}

fn parse_scalar(text: &str, line: usize) -> Result<f32, AssetError> {
    let token = text.split_whitespace().next().unwrap_or("");
    token.parse().map_err(|_| AssetError::Parse {
        line,
        message: format!("invalid number '{}'", token),
    })
}

fn parse_color(text: &str, line: usize) -> Result<Vec3, AssetError> {
    let values = text
        .split_whitespace()
        .map(|token| parse_scalar(token, line))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [r, g, b, ..] => Ok(Vec3::new(*r, *g, *b)),
        _ => Err(AssetError::Parse {
            line,
            message: "color needs 3 components".to_string(),
        }),
    }
}
