//! Cartesian expansion over nested sequences
//!
//! Each declared path names a sequence relative to an element of the
//! previous one (the first relative to the record itself). Every combination
//! of elements down to the last path becomes one row: the walk of the record,
//! then the walk of each chosen element, outermost first.
//!
//! An empty sequence contributes no rows beneath it. When the first-level
//! sequence is empty the record yields no rows and an empty manifest.

use crate::error::{Error, Result};
use crate::flatten::path::ExpandPath;
use crate::flatten::walker::walk;
use crate::record::{Node, Record};
use crate::types::{Fields, FlattenConfig, Manifest};
use tracing::{debug, trace};

/// Rows produced from one record, with the manifest of the first row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expansion {
    pub manifest: Manifest,
    pub rows: Vec<Fields>,
}

/// Position in one sequence, with the fields of everything above it
struct Frame<'n, 'a> {
    items: &'n [Node<'a>],
    index: usize,
    level: usize,
    prefix: Fields,
}

/// Expands records over the paths declared in a [`FlattenConfig`]
pub struct Expander<'c> {
    config: &'c FlattenConfig,
    paths: Vec<ExpandPath>,
}

impl<'c> Expander<'c> {
    /// Fails with [`Error::EmptyPath`] when the config declares no path
    pub fn new(config: &'c FlattenConfig) -> Result<Self> {
        if config.expand_paths.is_empty() {
            return Err(Error::EmptyPath);
        }
        let paths = config
            .expand_paths
            .iter()
            .map(|p| ExpandPath::parse(p))
            .collect();
        Ok(Expander { config, paths })
    }

    /// Stream every row of `record` into `sink`.
    ///
    /// Returns the manifest of the first row. Every path is resolved over
    /// the whole record before the first row is emitted, so a path error
    /// reaches the caller with nothing delivered. A sink error ends the
    /// expansion where it occurs.
    pub fn expand<R, F>(&self, record: &R, mut sink: F) -> Result<Manifest>
    where
        R: Record + ?Sized,
        F: FnMut(Fields) -> Result<()>,
    {
        let root = record.to_node();
        let depth = self.paths.len();
        debug!(paths = depth, "expanding record");

        self.check(&root, 0)?;

        let mut frames: Vec<Frame<'_, '_>> = Vec::with_capacity(depth);
        let items = self.paths[0].resolve(&root)?;
        trace!(level = 0, len = items.len(), "resolved sequence");
        frames.push(Frame {
            items,
            index: 0,
            level: 0,
            prefix: walk(&root, self.config),
        });

        let mut manifest = None;
        let mut emitted = 0usize;

        while let Some(frame) = frames.last_mut() {
            let items = frame.items;
            let Some(element) = items.get(frame.index) else {
                frames.pop();
                continue;
            };
            frame.index += 1;
            let level = frame.level;
            let fields = walk(element, self.config);

            if level + 1 < depth {
                let items = self.paths[level + 1].resolve(element)?;
                trace!(level = level + 1, len = items.len(), "resolved sequence");
                frames.push(Frame {
                    items,
                    index: 0,
                    level: level + 1,
                    prefix: fields,
                });
                continue;
            }

            let row = assemble(&frames, fields);
            if manifest.is_none() {
                manifest = Some(row.manifest());
            }
            sink(row)?;
            emitted += 1;
        }

        debug!(rows = emitted, "expansion finished");
        Ok(manifest.unwrap_or_default())
    }

    /// Collect every row of `record`
    pub fn expand_all<R: Record + ?Sized>(&self, record: &R) -> Result<Expansion> {
        let mut rows = Vec::new();
        let manifest = self.expand(record, |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(Expansion { manifest, rows })
    }

    /// Resolve `paths[level..]` under `node` and every element beneath it.
    /// Recursion depth is bounded by the number of paths.
    fn check(&self, node: &Node<'_>, level: usize) -> Result<()> {
        let items = self.paths[level].resolve(node)?;
        if level + 1 < self.paths.len() {
            for item in items {
                self.check(item, level + 1)?;
            }
        }
        Ok(())
    }
}

/// Prefixes of every active frame, outermost first, then the leaf fields
fn assemble(frames: &[Frame<'_, '_>], fields: Fields) -> Fields {
    let width = frames.iter().map(|f| f.prefix.len()).sum::<usize>() + fields.len();
    let mut row = Fields(Vec::with_capacity(width));
    for frame in frames {
        row.extend(frame.prefix.iter().cloned());
    }
    row.extend(fields);
    row
}
