//! Tile map loader and collision queries.
//!
//! Maps are authored in Tiled and exported as JSON. Only the parts the
//! movement core needs are kept: tile layers (as global tile ids), the
//! `collides` property of tileset tiles, and the spawn object.
//!
//! Reference: <https://doc.mapeditor.org/en/stable/reference/json-map-format/>
//!
//! # Usage
//! ```ignore
//! let map = TileMap::load("maps/start.json")?;
//! let spawn = map.spawn_tile();
//! assert!(map.is_passable(spawn));
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context};
use serde::Deserialize;

use crate::math::TilePos;

/// Name of the object marking where players appear.
pub const SPAWN_OBJECT_NAME: &str = "Spawn Point";

/// Name of the per-tile boolean property that blocks movement.
pub const COLLIDES_PROPERTY: &str = "collides";

/// Tiled stores flip/rotation flags in the top bits of a gid.
const GID_FLAG_MASK: u32 = 0x1FFF_FFFF;

/// Number of cells in a `width` x `height` grid, if it fits in memory indices.
fn cell_count(width: u32, height: u32) -> Option<usize> {
    (width as usize).checked_mul(height as usize)
}

/// Collision oracle over a tile grid.
pub trait TileGrid: Send + Sync {
    /// True if an entity may step onto `pos`.
    fn is_passable(&self, pos: TilePos) -> bool;
}

/// One tile layer: a row-major grid of global tile ids (0 = empty).
#[derive(Debug, Clone, Default)]
pub struct TileLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    gids: Vec<u32>,
}

impl TileLayer {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            gids: vec![0; cell_count(width, height).unwrap_or(0)],
        }
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 {
            return None;
        }
        let (x, y) = (pos.x as u32, pos.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)
    }

    /// Global tile id at `pos`, or `None` if the cell is empty or out of bounds.
    pub fn gid_at(&self, pos: TilePos) -> Option<u32> {
        self.index(pos)
            .and_then(|i| self.gids.get(i).copied())
            .filter(|gid| *gid != 0)
    }

    fn set(&mut self, pos: TilePos, gid: u32) {
        if let Some(i) = self.index(pos) {
            self.gids[i] = gid & GID_FLAG_MASK;
        }
    }
}

/// A loaded tile map.
#[derive(Debug, Clone, Default)]
pub struct TileMap {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub layers: Vec<TileLayer>,
    colliding: HashSet<u32>,
    spawn: Option<TilePos>,
}

impl TileMap {
    /// Loads a Tiled JSON map from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let text =
            std::fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
        let mut map =
            Self::from_json_str(&text).with_context(|| format!("parse {}", path.display()))?;
        map.name = name;
        Ok(map)
    }

    /// Parses a Tiled JSON map.
    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let raw: RawMap = serde_json::from_str(s).context("tiled json")?;
        if raw.tilewidth == 0 || raw.tileheight == 0 {
            bail!("tile size must be non-zero");
        }

        let mut map = TileMap {
            name: "unknown".to_string(),
            width: raw.width,
            height: raw.height,
            tile_width: raw.tilewidth,
            tile_height: raw.tileheight,
            ..Default::default()
        };

        for layer in raw.layers {
            match layer {
                RawLayer::Tiles {
                    name,
                    width,
                    height,
                    data,
                    encoding,
                } => {
                    if let Some(enc) = encoding.filter(|e| e != "csv") {
                        bail!("layer {name}: unsupported encoding {enc}");
                    }
                    let Some(expected) = cell_count(width, height) else {
                        bail!("layer {name}: {width}x{height} tiles is too large");
                    };
                    if data.len() != expected {
                        bail!(
                            "layer {name}: expected {expected} tiles, found {}",
                            data.len()
                        );
                    }
                    let gids = data.into_iter().map(|g| g & GID_FLAG_MASK).collect();
                    map.layers.push(TileLayer {
                        name,
                        width,
                        height,
                        gids,
                    });
                }
                RawLayer::Objects { objects } => {
                    if map.spawn.is_some() {
                        continue;
                    }
                    map.spawn = objects
                        .iter()
                        .find(|o| o.name == SPAWN_OBJECT_NAME)
                        .map(|o| {
                            TilePos::new(
                                (o.x / raw.tilewidth as f32).floor() as i32,
                                (o.y / raw.tileheight as f32).floor() as i32,
                            )
                        });
                }
                RawLayer::Other => {}
            }
        }

        for tileset in raw.tilesets {
            for tile in tileset.tiles {
                let collides = tile
                    .properties
                    .iter()
                    .any(|p| p.name == COLLIDES_PROPERTY && p.value.as_bool() == Some(true));
                if collides {
                    let Some(gid) = tileset.firstgid.checked_add(tile.id) else {
                        bail!(
                            "tileset firstgid {} + tile id {} overflows",
                            tileset.firstgid,
                            tile.id
                        );
                    };
                    map.colliding.insert(gid);
                }
            }
        }

        Ok(map)
    }

    /// Starts a programmatic map of `width` x `height` tiles.
    pub fn builder(width: u32, height: u32) -> TileMapBuilder {
        TileMapBuilder {
            map: TileMap {
                name: "built".to_string(),
                width,
                height,
                tile_width: crate::math::TILE_SIZE as u32,
                tile_height: crate::math::TILE_SIZE as u32,
                ..Default::default()
            },
        }
    }

    /// Tile where players appear. Maps without a spawn object use the origin.
    pub fn spawn_tile(&self) -> TilePos {
        self.spawn.unwrap_or(TilePos::ZERO)
    }

    /// True if at least one layer defines a tile at `pos`.
    pub fn has_tile(&self, pos: TilePos) -> bool {
        self.layers.iter().any(|l| l.gid_at(pos).is_some())
    }

    /// True if any layer's tile at `pos` is marked as colliding.
    pub fn collides(&self, pos: TilePos) -> bool {
        self.layers
            .iter()
            .filter_map(|l| l.gid_at(pos))
            .any(|gid| self.colliding.contains(&gid))
    }
}

impl TileGrid for TileMap {
    fn is_passable(&self, pos: TilePos) -> bool {
        self.has_tile(pos) && !self.collides(pos)
    }
}

/// Builds maps in code; used by tests and tools.
#[derive(Debug, Clone)]
pub struct TileMapBuilder {
    map: TileMap,
}

impl TileMapBuilder {
    /// Adds a layer filled with `gid` (0 leaves it empty).
    pub fn layer(mut self, name: &str, gid: u32) -> Self {
        let mut layer = TileLayer::new(name, self.map.width, self.map.height);
        layer.gids.fill(gid & GID_FLAG_MASK);
        self.map.layers.push(layer);
        self
    }

    /// Places `gid` at `pos` on the named layer, creating the layer if needed.
    pub fn tile(mut self, layer: &str, pos: TilePos, gid: u32) -> Self {
        if !self.map.layers.iter().any(|l| l.name == layer) {
            self = self.layer(layer, 0);
        }
        if let Some(l) = self.map.layers.iter_mut().find(|l| l.name == layer) {
            l.set(pos, gid);
        }
        self
    }

    /// Clears `pos` on every layer.
    pub fn hole(mut self, pos: TilePos) -> Self {
        for l in &mut self.map.layers {
            l.set(pos, 0);
        }
        self
    }

    /// Marks `gid` as carrying `collides = true`.
    pub fn colliding(mut self, gid: u32) -> Self {
        self.map.colliding.insert(gid);
        self
    }

    pub fn spawn(mut self, pos: TilePos) -> Self {
        self.map.spawn = Some(pos);
        self
    }

    pub fn build(self) -> TileMap {
        self.map
    }
}

// ─── Tiled JSON shapes ───

#[derive(Deserialize)]
struct RawMap {
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    layers: Vec<RawLayer>,
    #[serde(default)]
    tilesets: Vec<RawTileset>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawLayer {
    #[serde(rename = "tilelayer")]
    Tiles {
        name: String,
        width: u32,
        height: u32,
        #[serde(default)]
        data: Vec<u32>,
        #[serde(default)]
        encoding: Option<String>,
    },
    #[serde(rename = "objectgroup")]
    Objects {
        #[serde(default)]
        objects: Vec<RawObject>,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawObject {
    #[serde(default)]
    name: String,
    x: f32,
    y: f32,
}

#[derive(Deserialize)]
struct RawTileset {
    firstgid: u32,
    #[serde(default)]
    tiles: Vec<RawTile>,
}

#[derive(Deserialize)]
struct RawTile {
    id: u32,
    #[serde(default)]
    properties: Vec<RawProperty>,
}

#[derive(Deserialize)]
struct RawProperty {
    name: String,
    value: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_MAP: &str = r#"
{
  "width": 3, "height": 2, "tilewidth": 32, "tileheight": 32,
  "layers": [
    { "type": "tilelayer", "name": "Below Player", "width": 3, "height": 2,
      "data": [1, 1, 0,
               1, 1, 1] },
    { "type": "tilelayer", "name": "World", "width": 3, "height": 2,
      "data": [0, 3, 0,
               0, 0, 2147483651] },
    { "type": "objectgroup", "name": "Objects",
      "objects": [ { "name": "Spawn Point", "x": 40.0, "y": 20.5 } ] },
    { "type": "imagelayer", "name": "Sky" }
  ],
  "tilesets": [
    { "firstgid": 1, "tiles": [
        { "id": 2, "properties": [ { "name": "collides", "type": "bool", "value": true } ] },
        { "id": 1, "properties": [ { "name": "collides", "type": "bool", "value": false } ] }
    ] }
  ]
}
"#;

    #[test]
    fn parses_layers_spawn_and_collisions() {
        let map = TileMap::from_json_str(SMALL_MAP).unwrap();
        assert_eq!(map.layers.len(), 2);
        assert_eq!(map.spawn_tile(), TilePos::new(1, 0));

        assert!(map.is_passable(TilePos::new(0, 0)));
        // Floor below, wall on "World".
        assert!(!map.is_passable(TilePos::new(1, 0)));
        // No tile on any layer.
        assert!(!map.is_passable(TilePos::new(2, 0)));
        // Flipped gid still resolves to the colliding tile.
        assert!(!map.is_passable(TilePos::new(2, 1)));
        assert!(!map.is_passable(TilePos::new(-1, 0)));
        assert!(!map.is_passable(TilePos::new(0, 2)));
    }

    #[test]
    fn rejects_mismatched_layer_data() {
        let bad = r#"{ "width": 2, "height": 2, "tilewidth": 32, "tileheight": 32,
            "layers": [ { "type": "tilelayer", "name": "A", "width": 2, "height": 2, "data": [1] } ] }"#;
        let err = TileMap::from_json_str(bad).unwrap_err();
        assert!(format!("{err:#}").contains("expected 4 tiles"));
    }

    #[test]
    fn builder_marks_walls_and_holes() {
        let map = TileMap::builder(4, 1)
            .layer("Below Player", 1)
            .tile("World", TilePos::new(2, 0), 9)
            .colliding(9)
            .hole(TilePos::new(3, 0))
            .build();
        assert!(map.is_passable(TilePos::new(1, 0)));
        assert!(!map.is_passable(TilePos::new(2, 0)));
        assert!(!map.is_passable(TilePos::new(3, 0)));
        assert_eq!(map.spawn_tile(), TilePos::ZERO);
    }

    #[test]
    fn oversized_layer_is_an_error() {
        let huge = r#"{ "width": 65536, "height": 65536, "tilewidth": 32, "tileheight": 32,
            "layers": [ { "type": "tilelayer", "name": "Vast", "width": 65536, "height": 65536, "data": [] } ] }"#;
        let err = TileMap::from_json_str(huge).unwrap_err();
        assert!(format!("{err:#}").contains("layer Vast"), "{err:#}");
    }

    #[test]
    fn colliding_gid_overflow_is_an_error() {
        let bad = r#"{ "width": 1, "height": 1, "tilewidth": 32, "tileheight": 32,
            "tilesets": [ { "firstgid": 4294967295, "tiles": [
                { "id": 3, "properties": [ { "name": "collides", "value": true } ] } ] } ] }"#;
        let err = TileMap::from_json_str(bad).unwrap_err();
        assert!(format!("{err:#}").contains("overflows"), "{err:#}");
    }
}
