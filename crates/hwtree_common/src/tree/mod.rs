//! Device Tree
//!
//! The ownership structure every probe populates. Nodes live in an arena
//! owned by [`DeviceTree`]; a [`NodeId`] is an index into it and stays valid
//! for the tree's lifetime because nodes are never removed.
//!
//! Three lookup modes address the same node:
//! - structural path: `"core/cpu:0"` (ids separated by `/`)
//! - handle: `"SCSI:00:00:01:00"`
//! - logical name: `"/dev/sda"`

mod node;

pub use node::{DeviceNode, HwClass};

use serde_json::{json, Map, Value};

/// Stable reference to a node inside a [`DeviceTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Hardware ownership tree
#[derive(Debug, Clone)]
pub struct DeviceTree {
    nodes: Vec<DeviceNode>,
}

impl Default for DeviceTree {
    fn default() -> Self {
        Self::new(DeviceNode::new("computer", HwClass::System))
    }
}

impl DeviceTree {
    /// Create a tree whose root is `root`
    pub fn new(mut root: DeviceNode) -> Self {
        root.children.clear();
        root.parent = None;
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node behind `id`. Ids are only handed out by this tree.
    pub fn node(&self, id: NodeId) -> &DeviceNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DeviceNode {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Append `node` under `parent` and return its stable id.
    ///
    /// Sibling ids stay unique: adding a second `"cpu"` renames the first
    /// to `"cpu:0"` and names the newcomer `"cpu:1"`.
    pub fn add_child(&mut self, parent: NodeId, mut node: DeviceNode) -> NodeId {
        let base = node.id().to_string();

        let mut renamed = false;
        if let Some(existing) = self.child_by_id(parent, &base) {
            self.nodes[existing.0].set_id(format!("{}:0", base));
            renamed = true;
        }

        if renamed || self.child_by_id(parent, &format!("{}:0", base)).is_some() {
            let mut n = 1;
            while self.child_by_id(parent, &format!("{}:{}", base, n)).is_some() {
                n += 1;
            }
            node.set_id(format!("{}:{}", base, n));
        }

        node.children.clear();
        node.parent = Some(parent);

        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Overwrite the contents of `id` with `node`, keeping its place in the
    /// tree: id, parent and children are those of the existing node.
    pub fn replace(&mut self, id: NodeId, mut node: DeviceNode) {
        let current = &mut self.nodes[id.0];
        node.set_id(current.id().to_string());
        node.parent = current.parent;
        node.children = std::mem::take(&mut current.children);
        *current = node;
    }

    fn child_by_id(&self, parent: NodeId, id: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|child| self.node(*child).id() == id)
    }

    /// Resolve a `/`-separated id path below `from`. Never creates nodes.
    pub fn get_child(&self, from: NodeId, path: &str) -> Option<NodeId> {
        let mut current = from;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self.child_by_id(current, segment)?;
        }
        Some(current)
    }

    /// Depth-first search of the subtree rooted at `from` (inclusive)
    pub fn find_by_handle(&self, from: NodeId, handle: &str) -> Option<NodeId> {
        self.find(from, |node| node.handle() == Some(handle))
    }

    /// Depth-first search of the subtree rooted at `from` (inclusive)
    pub fn find_by_logical_name(&self, from: NodeId, name: &str) -> Option<NodeId> {
        self.find(from, |node| node.logical_name() == Some(name))
    }

    fn find<F>(&self, from: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&DeviceNode) -> bool,
    {
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            if predicate(node) {
                return Some(id);
            }
            stack.extend(node.children.iter().rev().copied());
        }
        None
    }

    /// Immediate children of `id` with the given class
    pub fn count_children(&self, id: NodeId, class: HwClass) -> usize {
        self.children(id)
            .iter()
            .filter(|child| self.node(**child).class() == class)
            .count()
    }

    /// Mark `id` as identified; with `recursive`, its whole subtree too.
    pub fn claim(&mut self, id: NodeId, recursive: bool) {
        if !recursive {
            self.nodes[id.0].claim();
            return;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            node.claim();
            stack.extend(node.children.iter().copied());
        }
    }

    /// Slash-joined ids from the root (the root itself is `""`)
    pub fn path_of(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            segments.push(self.node(current).id());
            current = parent;
        }
        segments.reverse();
        segments.join("/")
    }

    /// Nested JSON view of the subtree at `id`
    pub fn to_json(&self, id: NodeId) -> Value {
        let node = self.node(id);
        let mut map = Map::new();
        map.insert("id".into(), json!(node.id()));
        map.insert("class".into(), json!(node.class()));
        map.insert("claimed".into(), json!(node.is_claimed()));

        let optional = [
            ("handle", node.handle()),
            ("description", node.description()),
            ("vendor", node.vendor()),
            ("product", node.product()),
            ("version", node.version()),
            ("serial", node.serial()),
            ("logicalname", node.logical_name()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.into(), json!(value));
            }
        }

        if node.capacity() > 0 {
            map.insert("capacity".into(), json!(node.capacity()));
        }

        let capabilities: Vec<&str> = node.capabilities().collect();
        if !capabilities.is_empty() {
            map.insert("capabilities".into(), json!(capabilities));
        }

        let config: Map<String, Value> = node
            .config_entries()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        if !config.is_empty() {
            map.insert("configuration".into(), Value::Object(config));
        }

        if !node.children.is_empty() {
            let children: Vec<Value> = node.children.iter().map(|c| self.to_json(*c)).collect();
            map.insert("children".into(), Value::Array(children));
        }

        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_core() -> (DeviceTree, NodeId) {
        let mut tree = DeviceTree::default();
        let core = tree.add_child(tree.root(), DeviceNode::new("core", HwClass::Bus));
        (tree, core)
    }

    #[test]
    fn test_get_child_missing_does_not_mutate() {
        let tree = DeviceTree::default();
        assert_eq!(tree.get_child(tree.root(), "core/cpu:0"), None);
        assert_eq!(tree.len(), 1);
        assert!(tree.children(tree.root()).is_empty());
    }

    #[test]
    fn test_get_child_resolves_path() {
        let (mut tree, core) = tree_with_core();
        let cpu = tree.add_child(core, DeviceNode::new("cpu", HwClass::Processor));
        assert_eq!(tree.get_child(tree.root(), "core/cpu"), Some(cpu));
        assert_eq!(tree.get_child(tree.root(), "core"), Some(core));
        assert_eq!(tree.get_child(tree.root(), ""), Some(tree.root()));
        assert_eq!(tree.get_child(tree.root(), "Core/cpu"), None);
        assert_eq!(tree.path_of(cpu), "core/cpu");
        assert_eq!(tree.parent(cpu), Some(core));
    }

    #[test]
    fn test_sibling_ids_are_disambiguated() {
        let (mut tree, core) = tree_with_core();
        let first = tree.add_child(core, DeviceNode::new("cpu", HwClass::Processor));
        assert_eq!(tree.node(first).id(), "cpu");

        let second = tree.add_child(core, DeviceNode::new("cpu", HwClass::Processor));
        assert_eq!(tree.node(first).id(), "cpu:0");
        assert_eq!(tree.node(second).id(), "cpu:1");

        let third = tree.add_child(core, DeviceNode::new("cpu", HwClass::Processor));
        assert_eq!(tree.node(third).id(), "cpu:2");
        assert_eq!(tree.get_child(tree.root(), "core/cpu:1"), Some(second));
        assert_eq!(tree.count_children(core, HwClass::Processor), 3);
    }

    #[test]
    fn test_lookup_modes_agree() {
        let (mut tree, core) = tree_with_core();
        let mut disk = DeviceNode::new("disk", HwClass::Storage);
        disk.set_handle("SCSI:00:00:00:00");
        disk.set_logical_name("/dev/sda");
        let id = tree.add_child(core, disk);

        let root = tree.root();
        assert_eq!(tree.find_by_handle(root, "SCSI:00:00:00:00"), Some(id));
        assert_eq!(tree.find_by_logical_name(root, "/dev/sda"), Some(id));
        assert_eq!(tree.get_child(root, "core/disk"), Some(id));
        assert_eq!(tree.find_by_handle(root, "scsi:00:00:00:00"), None);
        assert_eq!(tree.find_by_logical_name(root, "/dev/sdb"), None);
    }

    #[test]
    fn test_find_is_scoped_to_subtree() {
        let mut tree = DeviceTree::default();
        let a = tree.add_child(tree.root(), DeviceNode::new("a", HwClass::Bus));
        let b = tree.add_child(tree.root(), DeviceNode::new("b", HwClass::Bus));
        let mut leaf = DeviceNode::new("leaf", HwClass::Generic);
        leaf.set_handle("X:1");
        let leaf = tree.add_child(b, leaf);
        assert_eq!(tree.find_by_handle(a, "X:1"), None);
        assert_eq!(tree.find_by_handle(b, "X:1"), Some(leaf));
    }

    #[test]
    fn test_recursive_claim() {
        let (mut tree, core) = tree_with_core();
        let cpu = tree.add_child(core, DeviceNode::new("cpu", HwClass::Processor));
        let cache = tree.add_child(cpu, DeviceNode::new("cache", HwClass::Memory));

        tree.claim(core, false);
        assert!(tree.node(core).is_claimed());
        assert!(!tree.node(cpu).is_claimed());

        tree.claim(cpu, true);
        assert!(tree.node(cpu).is_claimed());
        assert!(tree.node(cache).is_claimed());
        assert!(!tree.node(tree.root()).is_claimed());
    }

    #[test]
    fn test_replace_keeps_position() {
        let (mut tree, core) = tree_with_core();
        tree.add_child(core, DeviceNode::new("cpu", HwClass::Processor));
        let cpu = tree.add_child(core, DeviceNode::new("cpu", HwClass::Processor));
        let cache = tree.add_child(cpu, DeviceNode::new("cache", HwClass::Memory));

        let mut fresh = DeviceNode::new("cpu", HwClass::Processor);
        fresh.set_product("Sample CPU");
        tree.replace(cpu, fresh);

        assert_eq!(tree.node(cpu).id(), "cpu:1");
        assert_eq!(tree.node(cpu).product(), Some("Sample CPU"));
        assert_eq!(tree.parent(cpu), Some(core));
        assert_eq!(tree.children(cpu), &[cache]);
        assert_eq!(tree.children(core).len(), 2);
    }

    #[test]
    fn test_to_json_skips_unknown_fields() {
        let (mut tree, core) = tree_with_core();
        let mut disk = DeviceNode::new("disk", HwClass::Storage);
        disk.set_vendor("ATA");
        disk.set_capacity(500_107_862_016);
        disk.add_capability("7200rpm");
        disk.set_config("ansiversion", "5");
        tree.add_child(core, disk);

        let value = tree.to_json(tree.root());
        let disk = &value["children"][0]["children"][0];
        assert_eq!(disk["id"], "disk");
        assert_eq!(disk["class"], "storage");
        assert_eq!(disk["vendor"], "ATA");
        assert_eq!(disk["capacity"], 500_107_862_016u64);
        assert_eq!(disk["capabilities"][0], "7200rpm");
        assert_eq!(disk["configuration"]["ansiversion"], "5");
        assert!(disk.get("product").is_none());
        assert!(disk.get("children").is_none());
    }
}
