use serde::{Deserialize, Serialize};

/// An independently ordered shard of a topic's messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub id: i32,
}

impl Partition {
    pub fn new(id: i32) -> Self {
        Self { id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub partitions: Vec<Partition>,
}

impl Topic {
    /// Topic with partition ids `0..partition_count`, the broker layout.
    pub fn new(name: impl Into<String>, partition_count: usize) -> Self {
        Self {
            name: name.into(),
            partitions: (0..partition_count as i32).map(Partition::new).collect(),
        }
    }

    /// Topic with an explicit partition set, e.g. discovered from an archive
    /// directory where ids need not be contiguous.
    pub fn with_partitions(name: impl Into<String>, mut partitions: Vec<Partition>) -> Self {
        partitions.sort_by_key(|p| p.id);
        Self {
            name: name.into(),
            partitions,
        }
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn has_partition(&self, id: i32) -> bool {
        self.partitions.iter().any(|p| p.id == id)
    }
}
