//! # Access Graph Export
//!
//! Materializes the admin → accountant → customer → credential hierarchy,
//! plus delegation edges, as nodes and edges for visualization.
//!
//! The graph is derived from the authoritative fields (owning customer,
//! assigned accountant, delegation ledger) on every call. The denormalized
//! `graph_depth`/`parent_nodes` bookkeeping is never consulted.
//!
//! Node ids are derived from entity ids (`accountant-<uuid>`,
//! `customer-<uuid>`, `credential-<uuid>`, `user-<uuid>`, plus the fixed
//! `admin-root`), nodes are sorted by `(level, id)` and edges by
//! `(from, to, relationship)`, so repeated exports of the same state are
//! identical.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use taxbridge_core::{CredentialId, CredentialNumber, CustomerId, Permission, Role, UserId};
use uuid::Uuid;

use crate::context::Identity;
use crate::directory::{Customer, User};
use crate::model::{CredentialDocument, CredentialStatus};

/// Id of the admin root node.
pub const ADMIN_ROOT_ID: &str = "admin-root";

/// Node category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Admin,
    Accountant,
    Customer,
    Credential,
    /// A delegatee with no other node in the graph.
    User,
}

/// Edge label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    /// Admin root → accountant.
    Manages,
    /// Accountant → customer.
    AssignedTo,
    /// Customer → credential.
    Owns,
    /// Credential → delegatee.
    DelegatedTo,
    /// Credential → owning customer (neighborhood view).
    BelongsTo,
    /// Credential → assigned accountant (neighborhood view).
    ManagedBy,
}

/// One graph node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    pub level: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_number: Option<CredentialNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CredentialStatus>,
}

impl GraphNode {
    fn new(id: String, kind: NodeKind, label: impl Into<String>, level: u32) -> Self {
        Self {
            id,
            kind,
            label: label.into(),
            level,
            customer_number: None,
            credential_number: None,
            status: None,
        }
    }
}

/// One graph edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub relationship: Relationship,
    /// Rendered dashed (delegations).
    pub dashed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Node and edge counts of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub accountants: usize,
    pub customers: usize,
    pub credentials: usize,
}

/// A role-filtered export of the access hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
}

impl AccessGraph {
    /// The graph with no nodes.
    pub fn empty() -> Self {
        GraphBuilder::default().finish()
    }
}

fn accountant_node_id(id: UserId) -> String {
    format!("accountant-{id}")
}

fn customer_node_id(id: CustomerId) -> String {
    format!("customer-{id}")
}

fn credential_node_id(id: CredentialId) -> String {
    format!("credential-{id}")
}

fn user_node_id(id: UserId) -> String {
    format!("user-{id}")
}

/// Accumulates nodes and edges, de-duplicating both.
#[derive(Debug, Default)]
struct GraphBuilder {
    nodes: BTreeMap<String, GraphNode>,
    edges: BTreeMap<(String, String, Relationship), GraphEdge>,
}

impl GraphBuilder {
    fn has(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn node(&mut self, node: GraphNode) {
        self.nodes.entry(node.id.clone()).or_insert(node);
    }

    fn edge(&mut self, from: &str, to: &str, relationship: Relationship) {
        self.push_edge(GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            relationship,
            dashed: false,
            expires_at: None,
        });
    }

    fn push_edge(&mut self, edge: GraphEdge) {
        let key = (edge.from.clone(), edge.to.clone(), edge.relationship);
        self.edges.entry(key).or_insert(edge);
    }

    fn accountant(&mut self, id: UserId, name: &str, level: u32) -> String {
        let node_id = accountant_node_id(id);
        self.node(GraphNode::new(node_id.clone(), NodeKind::Accountant, name, level));
        node_id
    }

    fn customer(&mut self, doc: &CredentialDocument, level: u32) -> String {
        let node_id = customer_node_id(doc.customer_id);
        let mut node = GraphNode::new(node_id.clone(), NodeKind::Customer, &doc.customer_name, level);
        node.customer_number = Some(doc.customer_number.to_string());
        self.node(node);
        node_id
    }

    fn credential(&mut self, doc: &CredentialDocument, level: u32) -> String {
        let node_id = credential_node_id(doc.id);
        let mut node = GraphNode::new(
            node_id.clone(),
            NodeKind::Credential,
            format!("SRI: {}", doc.tax_id),
            level,
        );
        node.credential_number = Some(doc.credential_number.clone());
        node.status = Some(doc.status);
        self.node(node);
        node_id
    }

    /// Dashed edges from the credential to each effective delegatee. A
    /// delegatee already drawn as an accountant is linked to that node;
    /// anyone else gets a `user-<uuid>` node one level below the credential.
    fn delegations(&mut self, doc: &CredentialDocument, credential_node: &str, level: u32, now: DateTime<Utc>) {
        for d in doc.effective_delegations(now) {
            let accountant_id = accountant_node_id(d.delegated_to);
            let target = if self.has(&accountant_id) {
                accountant_id
            } else {
                let id = user_node_id(d.delegated_to);
                self.node(GraphNode::new(id.clone(), NodeKind::User, &d.delegated_to_name, level + 1));
                id
            };
            self.push_edge(GraphEdge {
                from: credential_node.to_string(),
                to: target,
                relationship: Relationship::DelegatedTo,
                dashed: true,
                expires_at: Some(d.expires_at),
            });
        }
    }

    fn finish(self) -> AccessGraph {
        let mut nodes: Vec<GraphNode> = self.nodes.into_values().collect();
        nodes.sort_by(|a, b| (a.level, &a.id).cmp(&(b.level, &b.id)));
        let edges: Vec<GraphEdge> = self.edges.into_values().collect();
        let count = |kind: NodeKind| nodes.iter().filter(|n| n.kind == kind).count();
        let stats = GraphStats {
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            accountants: count(NodeKind::Accountant),
            customers: count(NodeKind::Customer),
            credentials: count(NodeKind::Credential),
        };
        AccessGraph { nodes, edges, stats }
    }
}

/// Export the hierarchy as seen by `viewer`.
///
/// - Admin: `admin-root` (0) → every active accountant (1) → customers (2)
///   → every active credential (3).
/// - Accountant: self (0) → customers (1) → their assigned active
///   credentials (2).
/// - Customer: self (0) → own active credentials (1), plus each assigned
///   accountant (1) with an `ASSIGNED_TO` edge to the customer. A customer
///   identity without a customer record yields the empty graph.
///
/// `documents` is the full credential set; filtering happens here.
pub fn export_full_graph(
    viewer: &Identity,
    documents: &[CredentialDocument],
    accountants: &[User],
    customer: Option<&Customer>,
    now: DateTime<Utc>,
) -> AccessGraph {
    let mut g = GraphBuilder::default();
    let active = documents
        .iter()
        .filter(|d| d.status == CredentialStatus::Active);

    match viewer.role {
        Role::Admin => {
            g.node(GraphNode::new(ADMIN_ROOT_ID.into(), NodeKind::Admin, "Administration", 0));
            for acc in accountants {
                let id = g.accountant(acc.id, &acc.display_name, 1);
                g.edge(ADMIN_ROOT_ID, &id, Relationship::Manages);
            }
            for doc in active {
                let customer_node = g.customer(doc, 2);
                let credential_node = g.credential(doc, 3);
                g.edge(&customer_node, &credential_node, Relationship::Owns);
                if let Some(acc) = doc.assigned_accountant {
                    let acc_node = accountant_node_id(acc);
                    if g.has(&acc_node) {
                        g.edge(&acc_node, &customer_node, Relationship::AssignedTo);
                    }
                }
                g.delegations(doc, &credential_node, 3, now);
            }
        }
        Role::Accountant => {
            let root = g.accountant(viewer.id, &viewer.display_name, 0);
            for doc in active.filter(|d| d.assigned_accountant == Some(viewer.id)) {
                let customer_node = g.customer(doc, 1);
                let credential_node = g.credential(doc, 2);
                g.edge(&root, &customer_node, Relationship::AssignedTo);
                g.edge(&customer_node, &credential_node, Relationship::Owns);
                g.delegations(doc, &credential_node, 2, now);
            }
        }
        Role::Customer => {
            let Some(customer) = customer else {
                return g.finish();
            };
            let root = customer_node_id(customer.id);
            let mut node = GraphNode::new(root.clone(), NodeKind::Customer, &customer.full_name, 0);
            node.customer_number = Some(customer.customer_number.to_string());
            g.node(node);
            for doc in active.filter(|d| d.customer_id == customer.id) {
                let credential_node = g.credential(doc, 1);
                g.edge(&root, &credential_node, Relationship::Owns);
                if let Some(acc) = doc.assigned_accountant {
                    let name = doc.assigned_accountant_name.as_deref().unwrap_or("Accountant");
                    let acc_node = g.accountant(acc, name, 1);
                    g.edge(&acc_node, &root, Relationship::AssignedTo);
                }
            }
        }
    }

    g.finish()
}

// ---------------------------------------------------------------------------
// Single-credential neighborhood
// ---------------------------------------------------------------------------

/// The credential at the center of a neighborhood export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodNode {
    pub id: CredentialId,
    pub credential_number: CredentialNumber,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub tax_id: String,
    pub status: CredentialStatus,
}

/// A node adjacent to the credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborNode {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A labelled link to a possibly-absent neighbor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborLink {
    pub relationship: Relationship,
    pub node: Option<NeighborNode>,
}

/// Who granted a delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegatedBy {
    pub id: UserId,
    pub name: String,
}

/// The delegatee end of a delegation link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelegateeNode {
    pub id: UserId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    pub permissions: Vec<Permission>,
    pub expires_at: DateTime<Utc>,
}

/// An effective delegation on the credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelegationLink {
    pub relationship: Relationship,
    pub node: DelegateeNode,
    pub delegated_by: DelegatedBy,
}

/// Edges around the credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodEdges {
    pub customer: NeighborLink,
    pub accountant: NeighborLink,
    pub delegations: Vec<DelegationLink>,
}

/// Bookkeeping about the credential.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborhoodMetadata {
    pub graph_depth: u8,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: usize,
}

/// Single-credential view: owner, manager, effective delegations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialNeighborhood {
    pub node: NeighborhoodNode,
    pub edges: NeighborhoodEdges,
    pub metadata: NeighborhoodMetadata,
}

/// Export the neighborhood of one credential. `owner` enriches the
/// customer node when the directory knows the customer; otherwise the
/// snapshot stored on the credential is used.
pub fn export_neighborhood(
    doc: &CredentialDocument,
    owner: Option<&Customer>,
    now: DateTime<Utc>,
) -> CredentialNeighborhood {
    let customer = NeighborNode {
        id: *doc.customer_id.as_uuid(),
        kind: NodeKind::Customer,
        name: owner.map_or_else(|| doc.customer_name.clone(), |c| c.full_name.clone()),
        customer_number: Some(doc.customer_number.to_string()),
        email: owner.and_then(|c| c.email.clone()),
    };
    let accountant = doc.assigned_accountant.map(|id| NeighborNode {
        id: *id.as_uuid(),
        kind: NodeKind::Accountant,
        name: doc.assigned_accountant_name.clone().unwrap_or_default(),
        customer_number: None,
        email: None,
    });
    let delegations = doc
        .effective_delegations(now)
        .map(|d| DelegationLink {
            relationship: Relationship::DelegatedTo,
            node: DelegateeNode {
                id: d.delegated_to,
                kind: NodeKind::User,
                name: d.delegated_to_name.clone(),
                permissions: d.permissions.clone(),
                expires_at: d.expires_at,
            },
            delegated_by: DelegatedBy {
                id: d.delegated_by,
                name: d.delegated_by_name.clone(),
            },
        })
        .collect();

    CredentialNeighborhood {
        node: NeighborhoodNode {
            id: doc.id,
            credential_number: doc.credential_number.clone(),
            kind: NodeKind::Credential,
            tax_id: doc.tax_id.to_string(),
            status: doc.status,
        },
        edges: NeighborhoodEdges {
            customer: NeighborLink {
                relationship: Relationship::BelongsTo,
                node: Some(customer),
            },
            accountant: NeighborLink {
                relationship: Relationship::ManagedBy,
                node: accountant,
            },
            delegations,
        },
        metadata: NeighborhoodMetadata {
            graph_depth: doc.graph_depth,
            last_accessed_at: doc.last_accessed_at,
            access_count: doc.access_log.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AccessLogEntry;
    use crate::delegation::DelegationGrant;
    use crate::model::fixtures::*;
    use chrono::Duration;
    use taxbridge_core::{AccessType, CustomerNumber};

    struct World {
        admin: Identity,
        a1: User,
        a2: User,
        c1: Customer,
        docs: Vec<CredentialDocument>,
    }

    /// One admin; A1 manages C1 who owns two credentials; A2 manages nobody.
    fn world() -> World {
        let cipher = cipher();
        let a1 = accountant("A1");
        let a2 = accountant("A2");
        let c1 = customer("TB-000001");
        let docs = vec![
            document(&cipher, 1, "1790012345001", &c1, Some(&a1)),
            document(&cipher, 2, "1790012345002", &c1, Some(&a1)),
        ];
        World {
            admin: Identity::admin(UserId::new(), "Root"),
            a1,
            a2,
            c1,
            docs,
        }
    }

    fn count(g: &AccessGraph, rel: Relationship) -> usize {
        g.edges.iter().filter(|e| e.relationship == rel).count()
    }

    #[test]
    fn admin_graph_shape() {
        let w = world();
        let accountants = vec![w.a1.clone(), w.a2.clone()];
        let g = export_full_graph(&w.admin, &w.docs, &accountants, None, Utc::now());

        assert_eq!(g.nodes.iter().filter(|n| n.kind == NodeKind::Admin).count(), 1);
        assert_eq!(g.stats.accountants, 2);
        assert_eq!(g.stats.customers, 1);
        assert_eq!(g.stats.credentials, 2);
        assert_eq!(count(&g, Relationship::Manages), 2);
        assert_eq!(count(&g, Relationship::AssignedTo), 1);
        assert_eq!(count(&g, Relationship::Owns), 2);
        assert_eq!(g.stats.total_nodes, 6);
        assert_eq!(g.stats.total_edges, 5);

        let assigned = g
            .edges
            .iter()
            .find(|e| e.relationship == Relationship::AssignedTo)
            .unwrap();
        assert_eq!(assigned.from, format!("accountant-{}", w.a1.id));
        assert_eq!(assigned.to, format!("customer-{}", w.c1.id));
    }

    #[test]
    fn admin_graph_levels_follow_hierarchy() {
        let w = world();
        let g = export_full_graph(&w.admin, &w.docs, &[w.a1.clone()], None, Utc::now());
        for node in &g.nodes {
            let expected = match node.kind {
                NodeKind::Admin => 0,
                NodeKind::Accountant => 1,
                NodeKind::Customer => 2,
                NodeKind::Credential => 3,
                NodeKind::User => 4,
            };
            assert_eq!(node.level, expected, "{}", node.id);
        }
        assert_eq!(g.nodes[0].id, ADMIN_ROOT_ID);
    }

    #[test]
    fn export_is_deterministic() {
        let w = world();
        let accountants = vec![w.a1.clone(), w.a2.clone()];
        let now = Utc::now();
        let mut reversed = w.docs.clone();
        reversed.reverse();
        let a = export_full_graph(&w.admin, &w.docs, &accountants, None, now);
        let b = export_full_graph(&w.admin, &reversed, &accountants, None, now);
        assert_eq!(a, b);
    }

    #[test]
    fn inactive_credentials_are_excluded() {
        let mut w = world();
        w.docs[1].status = CredentialStatus::Revoked;
        let g = export_full_graph(&w.admin, &w.docs, &[w.a1.clone()], None, Utc::now());
        assert_eq!(g.stats.credentials, 1);
    }

    #[test]
    fn delegation_edges_are_dashed_and_skip_expired() {
        let mut w = world();
        let now = Utc::now();
        let delegatee = UserId::new();
        w.docs[0].add_delegation(
            DelegationGrant::new(
                (delegatee, "Temp".into()),
                (w.a1.id, "A1".into()),
                vec![Permission::View],
                now + Duration::hours(1),
                now,
            )
            .unwrap(),
            now,
        );
        // Delegate to A2 as well, who is drawn as an accountant node.
        w.docs[1].add_delegation(
            DelegationGrant::new(
                (w.a2.id, "A2".into()),
                (w.a1.id, "A1".into()),
                vec![Permission::Edit],
                now + Duration::hours(1),
                now,
            )
            .unwrap(),
            now,
        );
        let accountants = vec![w.a1.clone(), w.a2.clone()];

        let g = export_full_graph(&w.admin, &w.docs, &accountants, None, now);
        let delegated: Vec<_> = g
            .edges
            .iter()
            .filter(|e| e.relationship == Relationship::DelegatedTo)
            .collect();
        assert_eq!(delegated.len(), 2);
        assert!(delegated.iter().all(|e| e.dashed && e.expires_at.is_some()));
        assert!(delegated.iter().any(|e| e.to == format!("accountant-{}", w.a2.id)));
        let user_node = g.nodes.iter().find(|n| n.kind == NodeKind::User).unwrap();
        assert_eq!(user_node.id, format!("user-{delegatee}"));
        assert_eq!(user_node.level, 4);

        let later = export_full_graph(&w.admin, &w.docs, &accountants, None, now + Duration::hours(2));
        assert_eq!(count(&later, Relationship::DelegatedTo), 0);
        assert_eq!(later.stats.total_nodes, 6);
    }

    #[test]
    fn accountant_graph_is_rooted_at_self() {
        let w = world();
        let viewer = Identity::accountant(w.a1.id, "A1");
        let g = export_full_graph(&viewer, &w.docs, &[], None, Utc::now());

        assert_eq!(g.nodes[0].id, format!("accountant-{}", w.a1.id));
        assert_eq!(g.nodes[0].level, 0);
        assert_eq!(g.stats.customers, 1);
        assert_eq!(g.stats.credentials, 2);
        assert_eq!(count(&g, Relationship::AssignedTo), 1);
        assert_eq!(count(&g, Relationship::Owns), 2);
        assert!(g.nodes.iter().all(|n| n.kind != NodeKind::Admin));

        let other = Identity::accountant(w.a2.id, "A2");
        let g = export_full_graph(&other, &w.docs, &[], None, Utc::now());
        assert_eq!(g.stats.total_nodes, 1);
        assert_eq!(g.stats.total_edges, 0);
    }

    #[test]
    fn customer_graph_shows_own_credentials_and_accountant() {
        let w = world();
        let viewer = Identity::customer(UserId::new(), "C1", w.c1.customer_number.clone());
        let g = export_full_graph(&viewer, &w.docs, &[], Some(&w.c1), Utc::now());

        assert_eq!(g.nodes[0].id, format!("customer-{}", w.c1.id));
        assert_eq!(g.nodes[0].level, 0);
        assert_eq!(g.stats.credentials, 2);
        assert_eq!(g.stats.accountants, 1);
        assert_eq!(count(&g, Relationship::AssignedTo), 1);
        assert_eq!(count(&g, Relationship::Owns), 2);
    }

    #[test]
    fn customer_without_record_gets_empty_graph() {
        let w = world();
        let viewer = Identity::customer(
            UserId::new(),
            "Ghost",
            CustomerNumber::new("TB-404").unwrap(),
        );
        let g = export_full_graph(&viewer, &w.docs, &[], None, Utc::now());
        assert_eq!(g, AccessGraph::empty());
    }

    #[test]
    fn neighborhood_lists_owner_manager_and_effective_delegations() {
        let mut w = world();
        let now = Utc::now();
        let doc = &mut w.docs[0];
        let live = UserId::new();
        let stale = UserId::new();
        for (user, hours) in [(live, 5), (stale, 1)] {
            doc.add_delegation(
                DelegationGrant::new(
                    (user, "D".into()),
                    (w.a1.id, "A1".into()),
                    vec![Permission::View],
                    now + Duration::hours(hours),
                    now,
                )
                .unwrap(),
                now,
            );
        }
        doc.log_access(AccessLogEntry {
            accessed_by: w.a1.id,
            accessed_by_name: "A1".into(),
            access_type: AccessType::View,
            ip_address: None,
            user_agent: None,
            accessed_at: now,
        });

        let n = export_neighborhood(doc, Some(&w.c1), now + Duration::hours(2));
        assert_eq!(n.node.id, doc.id);
        assert_eq!(n.edges.customer.relationship, Relationship::BelongsTo);
        assert_eq!(n.edges.customer.node.as_ref().unwrap().name, w.c1.full_name);
        assert_eq!(n.edges.accountant.relationship, Relationship::ManagedBy);
        assert_eq!(n.edges.accountant.node.as_ref().unwrap().name, "A1");
        assert_eq!(n.edges.delegations.len(), 1);
        assert_eq!(n.edges.delegations[0].node.id, live);
        assert_eq!(n.edges.delegations[0].delegated_by.id, w.a1.id);
        assert_eq!(n.metadata.access_count, 1);
        assert_eq!(n.metadata.last_accessed_at, Some(now));
        assert_eq!(n.metadata.graph_depth, 3);
    }

    #[test]
    fn neighborhood_without_accountant_has_null_node() {
        let c = customer("TB-000009");
        let doc = document(&cipher(), 1, "1790012345001", &c, None);
        let n = export_neighborhood(&doc, None, Utc::now());
        assert!(n.edges.accountant.node.is_none());
        let json = serde_json::to_value(&n).unwrap();
        assert!(json["edges"]["accountant"]["node"].is_null());
        assert_eq!(json["edges"]["customer"]["relationship"], "BELONGS_TO");
        assert!(json["metadata"].get("access_log").is_none());
    }
}
