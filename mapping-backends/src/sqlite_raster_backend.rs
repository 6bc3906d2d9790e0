use crate::error::{self, Error};
use crate::raster_backend::{ClosestRaster, RasterBackend, TileHandle};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::sync::Mutex;

/// Reference `RasterBackend` backed by a single SQLite file, grounded in
/// `original_source/mapping/util/sqlite.cpp` (the original engine's own
/// metadata store). One tile per row; the descriptor JSON lives in a
/// one-row `meta` table.
pub struct SqliteRasterBackend {
    pool: Pool<SqliteConnectionManager>,
    writable: bool,
    // Serializes writes: SQLite allows one writer at a time, and concurrent
    // writers must already be serialized by the caller (import/delete).
    write_lock: Mutex<()>,
}

impl SqliteRasterBackend {
    pub fn open(path: &str, descriptor_json: Option<&str>, writable: bool) -> Result<Self, Error> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::new(manager).map_err(|source| error::Pool { source }.build())?;
        let conn = pool.get().map_err(|source| error::Pool { source }.build())?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             CREATE TABLE IF NOT EXISTS rasters (
                 rasterid INTEGER PRIMARY KEY AUTOINCREMENT,
                 channel INTEGER NOT NULL,
                 t_start INTEGER NOT NULL,
                 t_end INTEGER NOT NULL,
                 attrs_string TEXT NOT NULL,
                 attrs_numeric TEXT NOT NULL,
                 alias_of INTEGER
             );
             CREATE INDEX IF NOT EXISTS idx_rasters_channel_time ON rasters(channel, t_start, t_end);
             CREATE TABLE IF NOT EXISTS tiles (
                 rasterid INTEGER NOT NULL,
                 channel INTEGER NOT NULL,
                 zoom INTEGER NOT NULL,
                 x_offset INTEGER NOT NULL,
                 y_offset INTEGER NOT NULL,
                 z_offset INTEGER NOT NULL,
                 width INTEGER NOT NULL,
                 height INTEGER NOT NULL,
                 depth INTEGER NOT NULL,
                 compression_tag INTEGER NOT NULL,
                 payload BLOB NOT NULL,
                 PRIMARY KEY (channel, rasterid, zoom, x_offset, y_offset, z_offset)
             );",
        )
        .map_err(|source| error::Sqlite { source }.build())?;
        if let Some(json) = descriptor_json {
            conn.execute(
                "INSERT INTO meta(key, value) VALUES ('descriptor', ?1) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![json],
            )
            .map_err(|source| error::Sqlite { source }.build())?;
        }
        Ok(Self {
            pool,
            writable,
            write_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, Error> {
        self.pool.get().map_err(|source| error::Pool { source }.build())
    }

    /// A linked raster stores no tiles of its own; tile lookups for it must
    /// resolve to the `rasterid` it was linked from (spec §4.3 "Linking").
    fn resolve_storage_id(&self, rasterid: i64) -> Result<i64, Error> {
        let conn = self.conn()?;
        let alias_of: Option<i64> = conn
            .query_row("SELECT alias_of FROM rasters WHERE rasterid = ?1", params![rasterid], |row| row.get(0))
            .map_err(|source| error::Sqlite { source }.build())?;
        Ok(alias_of.unwrap_or(rasterid))
    }
}

#[async_trait]
impl RasterBackend for SqliteRasterBackend {
    async fn read_json(&self) -> Result<String, Error> {
        let conn = self.conn()?;
        conn.query_row("SELECT value FROM meta WHERE key = 'descriptor'", [], |row| row.get(0))
            .map_err(|source| error::Sqlite { source }.build())
    }

    async fn create_raster(
        &self,
        channel: usize,
        t_start: i64,
        t_end: i64,
        attrs_string: &HashMap<String, String>,
        attrs_numeric: &HashMap<String, f64>,
    ) -> Result<i64, Error> {
        if !self.writable {
            return error::ReadOnly.fail();
        }
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let conn = self.conn()?;
        let attrs_string_json = serde_json::to_string(attrs_string).map_err(|source| error::Json { source }.build())?;
        let attrs_numeric_json = serde_json::to_string(attrs_numeric).map_err(|source| error::Json { source }.build())?;
        conn.execute(
            "INSERT INTO rasters(channel, t_start, t_end, attrs_string, attrs_numeric) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![channel as i64, t_start, t_end, attrs_string_json, attrs_numeric_json],
        )
        .map_err(|source| error::Sqlite { source }.build())?;
        Ok(conn.last_insert_rowid())
    }

    async fn link_raster(&self, channel: usize, t_ref: i64, t_start: i64, t_end: i64) -> Result<(), Error> {
        if !self.writable {
            return error::ReadOnly.fail();
        }
        let source = self.closest_raster(channel, t_ref).await?;
        let (attrs_string, attrs_numeric) = self.read_attributes(source.rasterid).await?;
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let conn = self.conn()?;
        let attrs_string_json = serde_json::to_string(&attrs_string).map_err(|source| error::Json { source }.build())?;
        let attrs_numeric_json = serde_json::to_string(&attrs_numeric).map_err(|source| error::Json { source }.build())?;
        conn.execute(
            "INSERT INTO rasters(channel, t_start, t_end, attrs_string, attrs_numeric, alias_of)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![channel as i64, t_start, t_end, attrs_string_json, attrs_numeric_json, source.rasterid],
        )
        .map_err(|source| error::Sqlite { source }.build())?;
        Ok(())
    }

    async fn has_tile(&self, rasterid: i64, _w: u32, _h: u32, _d: u32, x: i64, y: i64, z_off: i64, zoom: u8) -> Result<bool, Error> {
        let storage_id = self.resolve_storage_id(rasterid)?;
        let conn = self.conn()?;
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM tiles WHERE rasterid = ?1 AND zoom = ?2 AND x_offset = ?3 AND y_offset = ?4 AND z_offset = ?5",
                params![storage_id, zoom, x, y, z_off],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| error::Sqlite { source }.build())?;
        Ok(exists.is_some())
    }

    async fn write_tile(
        &self,
        rasterid: i64,
        bytes: &[u8],
        w: u32,
        h: u32,
        d: u32,
        x: i64,
        y: i64,
        z_off: i64,
        zoom: u8,
        compression_tag: u8,
    ) -> Result<(), Error> {
        if !self.writable {
            return error::ReadOnly.fail();
        }
        let storage_id = self.resolve_storage_id(rasterid)?;
        let channel: i64 = {
            let conn = self.conn()?;
            conn.query_row("SELECT channel FROM rasters WHERE rasterid = ?1", params![storage_id], |row| row.get(0))
                .map_err(|source| error::Sqlite { source }.build())?
        };
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO tiles
             (rasterid, channel, zoom, x_offset, y_offset, z_offset, width, height, depth, compression_tag, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![storage_id, channel, zoom, x, y, z_off, w, h, d, compression_tag, bytes],
        )
        .map_err(|source| error::Sqlite { source }.build())?;
        Ok(())
    }

    async fn closest_raster(&self, channel: usize, t: i64) -> Result<ClosestRaster, Error> {
        let conn = self.conn()?;
        // Ties broken by shortest interval, then lowest rasterid.
        let row = conn
            .query_row(
                "SELECT rasterid, t_start, t_end FROM rasters
                 WHERE channel = ?1 AND t_start <= ?2 AND t_end >= ?2
                 ORDER BY (t_end - t_start) ASC, rasterid ASC
                 LIMIT 1",
                params![channel as i64, t],
                |row| {
                    Ok(ClosestRaster {
                        rasterid: row.get(0)?,
                        t_start: row.get(1)?,
                        t_end: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|source| error::Sqlite { source }.build())?;
        match row {
            Some(closest) => Ok(closest),
            None => error::NoRasterForGivenTime { channel, t }.fail(),
        }
    }

    async fn best_zoom(&self, rasterid: i64, zoom: u8) -> Result<u8, Error> {
        let storage_id = self.resolve_storage_id(rasterid)?;
        let conn = self.conn()?;
        let stored: Option<u8> = conn
            .query_row(
                "SELECT MAX(zoom) FROM tiles WHERE rasterid = ?1 AND zoom <= ?2",
                params![storage_id, zoom],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| error::Sqlite { source }.build())?
            .flatten();
        Ok(stored.unwrap_or(0))
    }

    async fn enumerate_tiles(
        &self,
        channel: usize,
        rasterid: i64,
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
        zoom: u8,
    ) -> Result<Vec<TileHandle>, Error> {
        let storage_id = self.resolve_storage_id(rasterid)?;
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT rasterid, zoom, x_offset, y_offset, z_offset, width, height, depth, compression_tag
                 FROM tiles WHERE channel = ?1 AND rasterid = ?2 AND zoom = ?3",
            )
            .map_err(|source| error::Sqlite { source }.build())?;
        let rows = stmt
            .query_map(params![channel as i64, storage_id, zoom], |row| {
                Ok(TileHandle {
                    rasterid: row.get(0)?,
                    zoom: row.get(1)?,
                    x_offset: row.get(2)?,
                    y_offset: row.get(3)?,
                    z_offset: row.get(4)?,
                    width: row.get(5)?,
                    height: row.get(6)?,
                    depth: row.get(7)?,
                    compression_tag: row.get(8)?,
                })
            })
            .map_err(|source| error::Sqlite { source }.build())?;
        let mut handles = Vec::new();
        for row in rows {
            let handle = row.map_err(|source| error::Sqlite { source }.build())?;
            let factor = 1i64 << handle.zoom;
            let (hx1, hy1) = (handle.x_offset, handle.y_offset);
            let (hx2, hy2) = (hx1 + handle.width as i64 * factor, hy1 + handle.height as i64 * factor);
            if hx1 < x2 && hx2 > x1 && hy1 < y2 && hy2 > y1 {
                handles.push(handle);
            }
        }
        Ok(handles)
    }

    async fn read_tile(&self, handle: &TileHandle) -> Result<Vec<u8>, Error> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT payload FROM tiles WHERE rasterid = ?1 AND zoom = ?2 AND x_offset = ?3 AND y_offset = ?4 AND z_offset = ?5",
            params![handle.rasterid, handle.zoom, handle.x_offset, handle.y_offset, handle.z_offset],
            |row| row.get(0),
        )
        .map_err(|source| error::Sqlite { source }.build())
    }

    async fn read_attributes(&self, rasterid: i64) -> Result<(HashMap<String, String>, HashMap<String, f64>), Error> {
        let conn = self.conn()?;
        let (attrs_string_json, attrs_numeric_json): (String, String) = conn
            .query_row(
                "SELECT attrs_string, attrs_numeric FROM rasters WHERE rasterid = ?1",
                params![rasterid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|source| error::Sqlite { source }.build())?;
        let attrs_string = serde_json::from_str(&attrs_string_json).map_err(|source| error::Json { source }.build())?;
        let attrs_numeric = serde_json::from_str(&attrs_numeric_json).map_err(|source| error::Json { source }.build())?;
        Ok((attrs_string, attrs_numeric))
    }

    fn is_writable(&self) -> bool {
        self.writable
    }
}
