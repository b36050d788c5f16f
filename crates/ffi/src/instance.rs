use atmos_sim_core::{AtmosConfig, AtmosSimulation, TileMap, Vec3};
use std::ptr;
use std::sync::RwLock;

use crate::error::{AtmosSimErrorCode, DefaultAtmosSimError};
use crate::helpers::{clear_last_error, track_error, track_result};

/// Creation settings for an atmos simulation instance.
///
/// Get the defaults from `atmos_sim_default_settings` and override what you need.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtmosSimSettings {
    /// Tiles per chunk along x.
    pub chunk_width: u32,
    /// Tiles per chunk along z.
    pub chunk_height: u32,
    /// Edge length of one tile in world units.
    pub tile_size: f32,
    /// World position of tile (0, 0).
    pub origin_x: f32,
    pub origin_y: f32,
    pub origin_z: f32,
    /// Seconds of `atmos_sim_update` time between ticks.
    pub update_rate: f32,
    /// Gas volume of every cell (litres).
    pub cell_volume: f32,
    /// Size of the dedicated worker pool, 0 to share the global pool.
    pub worker_threads: u32,
    /// Floor tiles on the edge of the map vent to space.
    pub edge_is_space: bool,
}

impl Default for AtmosSimSettings {
    fn default() -> Self {
        let config = AtmosConfig::default();
        Self {
            chunk_width: 16,
            chunk_height: 16,
            tile_size: 1.0,
            origin_x: 0.0,
            origin_y: 0.0,
            origin_z: 0.0,
            update_rate: config.update_rate,
            cell_volume: config.cell_volume,
            worker_threads: 0,
            edge_is_space: config.edge_is_space,
        }
    }
}

/// Mutable state behind the instance lock.
pub(crate) struct InstanceState {
    /// Tile layout edited through `atmos_sim_set_tile` and friends.
    pub(crate) tiles: TileMap,
    pub(crate) config: AtmosConfig,
    /// Built by the first successful `atmos_sim_rebuild`.
    pub(crate) sim: Option<AtmosSimulation>,
}

/// The atmos simulation context handed to C callers as an opaque pointer.
///
/// # Thread Safety
/// The tile map and simulation sit behind one `RwLock`: queries take a read
/// lock, edits and updates take the write lock. The instance can be shared
/// between a game thread and worker threads.
///
/// # Lifecycle
/// ```cpp
/// AtmosSimSettings settings = atmos_sim_default_settings();
/// AtmosSimInstance* sim = nullptr;
/// atmos_sim_new(settings, &sim);
/// atmos_sim_fill_room(sim, 0, 0, 9, 9);
/// atmos_sim_rebuild(sim);
///
/// // every frame
/// atmos_sim_update(sim, delta_seconds);
///
/// atmos_sim_destroy(sim);
/// ```
pub struct AtmosSimInstance {
    pub(crate) state: RwLock<InstanceState>,
}

impl AtmosSimInstance {
    /// Validate the settings and create an instance with an empty tile map.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` for zero chunk dimensions, a non-positive
    /// tile size, a non-finite origin, or config values rejected by `AtmosConfig::validate`.
    pub(crate) fn new(settings: &AtmosSimSettings) -> Result<Box<Self>, DefaultAtmosSimError> {
        if settings.chunk_width == 0 || settings.chunk_height == 0 {
            return Err(DefaultAtmosSimError::invalid_parameter(
                "chunk dimensions",
                &format!(
                    "must be positive, got {}x{}",
                    settings.chunk_width, settings.chunk_height
                ),
            ));
        }
        if !settings.tile_size.is_finite() || settings.tile_size <= 0.0 {
            return Err(DefaultAtmosSimError::invalid_parameter(
                "tile_size",
                &format!("must be finite and positive, got {}", settings.tile_size),
            ));
        }
        let origin = Vec3::new(settings.origin_x, settings.origin_y, settings.origin_z);
        if !origin.iter().all(|v| v.is_finite()) {
            return Err(DefaultAtmosSimError::invalid_parameter(
                "origin",
                "must be finite",
            ));
        }

        let config = AtmosConfig {
            update_rate: settings.update_rate,
            cell_volume: settings.cell_volume,
            worker_threads: (settings.worker_threads > 0)
                .then_some(settings.worker_threads as usize),
            edge_is_space: settings.edge_is_space,
            ..AtmosConfig::default()
        };
        config.validate()?;

        let tiles = TileMap::new(settings.chunk_width as usize, settings.chunk_height as usize)
            .with_tile_size(settings.tile_size)
            .with_origin(origin);

        Ok(Box::new(Self {
            state: RwLock::new(InstanceState {
                tiles,
                config,
                sim: None,
            }),
        }))
    }
}

/// Default creation settings.
#[no_mangle]
pub extern "C" fn atmos_sim_default_settings() -> AtmosSimSettings {
    AtmosSimSettings::default()
}

/// Create an atmos instance and return it via out-parameter.
///
/// The instance starts with an empty tile map. Lay out tiles with
/// `atmos_sim_set_tile` / `atmos_sim_fill_room`, then call `atmos_sim_rebuild`.
///
/// Returns
/// - `AtmosSimErrorCode::Ok` (0) with a valid pointer in `out_instance`
/// - `AtmosSimErrorCode::NullPointer` if `out_instance` is null
/// - `AtmosSimErrorCode::InvalidParameter` if the settings are rejected
///
/// # Safety
///
/// - `out_instance` must be a valid, non-null pointer to writable memory.
/// - The caller owns the returned instance and MUST call `atmos_sim_destroy`
///   exactly once.
#[no_mangle]
pub unsafe extern "C" fn atmos_sim_new(
    settings: AtmosSimSettings,
    out_instance: *mut *mut AtmosSimInstance,
) -> AtmosSimErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultAtmosSimError::null_pointer("out_instance"));
    }

    match track_result(AtmosSimInstance::new(&settings)) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            clear_last_error();
            AtmosSimErrorCode::Ok
        }
        Err(code) => {
            unsafe {
                *out_instance = ptr::null_mut();
            }
            code
        }
    }
}

/// Destroy an instance previously created by `atmos_sim_new`.
///
/// A null `ptr` is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `atmos_sim_new` and not freed already.
/// - The caller must not use the pointer after this call.
#[no_mangle]
pub unsafe extern "C" fn atmos_sim_destroy(ptr: *mut AtmosSimInstance) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: the pointer came from `Box::into_raw` in `atmos_sim_new`.
    unsafe {
        drop(Box::from_raw(ptr));
    }
}
