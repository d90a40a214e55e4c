//! A placed node inside a function.

use uuid::Uuid;

use crate::node_type::NodeType;

/// One placed instance of a node type.
///
/// Connection slots reference peer nodes by `(id, slot)` pairs into the
/// owning function's arena:
///
/// - each data input has at most one producer
/// - each data output fans out to any number of consumers
/// - each exec input accepts any number of predecessors
/// - each exec output has at most one successor
///
/// Pure node types declare no exec slots, so the exec containers are empty
/// for them by construction.
#[derive(Debug, Clone)]
pub struct NodeInstance {
    id: Uuid,
    x: f32,
    y: f32,
    ty: Box<dyn NodeType>,
    pub input_data_connections: Vec<Option<(Uuid, usize)>>,
    pub output_data_connections: Vec<Vec<(Uuid, usize)>>,
    pub input_exec_connections: Vec<Vec<(Uuid, usize)>>,
    pub output_exec_connections: Vec<Option<(Uuid, usize)>>,
}

impl NodeInstance {
    /// Places a node of the given type. Slot vectors are sized to the type's
    /// declared arities.
    pub fn new(ty: Box<dyn NodeType>, x: f32, y: f32, id: Uuid) -> Self {
        let input_data_connections = vec![None; ty.data_inputs().len()];
        let output_data_connections = vec![Vec::new(); ty.data_outputs().len()];
        let input_exec_connections = vec![Vec::new(); ty.exec_inputs().len()];
        let output_exec_connections = vec![None; ty.exec_outputs().len()];
        NodeInstance {
            id,
            x,
            y,
            ty,
            input_data_connections,
            output_data_connections,
            input_exec_connections,
            output_exec_connections,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The id in its canonical string form (used in JSON and diagnostics).
    pub fn string_id(&self) -> String {
        self.id.to_string()
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn set_position(&mut self, x: f32, y: f32) {
        self.x = x;
        self.y = y;
    }

    /// The node's type.
    pub fn node_type(&self) -> &dyn NodeType {
        self.ty.as_ref()
    }

    /// Replaces the type without touching connections. Slot renormalization
    /// is the caller's job (`GraphFunction::set_node_type`).
    pub(crate) fn replace_type(&mut self, ty: Box<dyn NodeType>) {
        self.ty = ty;
        self.input_data_connections
            .resize(self.ty.data_inputs().len(), None);
        self.output_data_connections
            .resize(self.ty.data_outputs().len(), Vec::new());
        self.input_exec_connections
            .resize(self.ty.exec_inputs().len(), Vec::new());
        self.output_exec_connections
            .resize(self.ty.exec_outputs().len(), None);
    }
}
