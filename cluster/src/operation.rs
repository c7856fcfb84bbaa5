use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::{DirectoryId, FileId, NodeId, measurement::NodeMeasurementData};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationType {
    Mkdirs,
    Create,
    DeleteFile,
    OpenFile,
    ListStatusDir,
    ListStatusFile,
    RenameFile,
    MoveFile,
}

impl OperationType {
    pub const ALL: [OperationType; 8] = [
        OperationType::Mkdirs,
        OperationType::Create,
        OperationType::DeleteFile,
        OperationType::OpenFile,
        OperationType::ListStatusDir,
        OperationType::ListStatusFile,
        OperationType::RenameFile,
        OperationType::MoveFile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperationType::Mkdirs => "MKDIRS",
            OperationType::Create => "CREATE",
            OperationType::DeleteFile => "DELETE_FILE",
            OperationType::OpenFile => "OPEN_FILE",
            OperationType::ListStatusDir => "LIST_STATUS_DIR",
            OperationType::ListStatusFile => "LIST_STATUS_FILE",
            OperationType::RenameFile => "RENAME_FILE",
            OperationType::MoveFile => "MOVE_FILE",
        }
    }
}

impl Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    // `parent_id` is `None` only for the root, which is created in the working directory.
    CreateDir {
        id: DirectoryId,
        parent_id: Option<DirectoryId>,
        use_grandparent: bool,
    },
    CreateFile {
        id: FileId,
        parent_id: DirectoryId,
    },
    Delete {
        file_id: FileId,
    },
    Open {
        file_id: FileId,
    },
    ListDir {
        dir_id: DirectoryId,
    },
    ListFile {
        file_id: FileId,
    },
    Rename {
        file_id: FileId,
    },
    Move {
        file_id: FileId,
        target_dir_id: DirectoryId,
    },
}

impl Operation {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Operation::CreateDir { .. } => OperationType::Mkdirs,
            Operation::CreateFile { .. } => OperationType::Create,
            Operation::Delete { .. } => OperationType::DeleteFile,
            Operation::Open { .. } => OperationType::OpenFile,
            Operation::ListDir { .. } => OperationType::ListStatusDir,
            Operation::ListFile { .. } => OperationType::ListStatusFile,
            Operation::Rename { .. } => OperationType::RenameFile,
            Operation::Move { .. } => OperationType::MoveFile,
        }
    }

    pub fn partition_key(&self) -> u64 {
        match self {
            Operation::CreateDir { id, .. } | Operation::CreateFile { id, .. } => *id,
            Operation::ListDir { dir_id } => *dir_id,
            Operation::Delete { file_id }
            | Operation::Open { file_id }
            | Operation::ListFile { file_id }
            | Operation::Rename { file_id }
            | Operation::Move { file_id, .. } => *file_id,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMessage {
    ResetProgress,
    ResetMeasurements,
    CollectMeasurements,
}

impl Display for ControlMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlMessage::ResetProgress => write!(f, "reset_progress"),
            ControlMessage::ResetMeasurements => write!(f, "reset_measurements"),
            ControlMessage::CollectMeasurements => write!(f, "collect_measurements"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum ControlReply {
    ProgressReset { node_id: NodeId, reported: u64 },
    MeasurementsReset { node_id: NodeId },
    Measurements(NodeMeasurementData),
}

impl ControlReply {
    pub fn node_id(&self) -> &str {
        match self {
            ControlReply::ProgressReset { node_id, .. } => node_id,
            ControlReply::MeasurementsReset { node_id } => node_id,
            ControlReply::Measurements(data) => &data.node_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_map_to_their_call_kind_and_partition_key() {
        let create = Operation::CreateDir {
            id: 9,
            parent_id: Some(3),
            use_grandparent: true,
        };
        assert_eq!(create.operation_type(), OperationType::Mkdirs);
        assert_eq!(create.partition_key(), 9);

        let mv = Operation::Move {
            file_id: 42,
            target_dir_id: 5,
        };
        assert_eq!(mv.operation_type().name(), "MOVE_FILE");
        assert_eq!(mv.partition_key(), 42);
        assert_eq!(Operation::ListDir { dir_id: 4 }.partition_key(), 4);
    }
}
