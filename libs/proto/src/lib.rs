//! Wire messages shared between the API, the change-feed worker and any
//! process listening on the realtime bus.

pub mod realtime {
    /// A row-level change on one of the backend tables, scoped to a tenant.
    #[derive(Clone, PartialEq, ::prost::Message, serde::Serialize)]
    pub struct ChangeEvent {
        #[prost(string, tag = "1")]
        pub tenant_id: String,
        #[prost(string, tag = "2")]
        pub table: String,
        #[prost(enumeration = "ChangeKind", tag = "3")]
        pub kind: i32,
        #[prost(string, tag = "4")]
        pub record_id: String,
        /// RFC 3339 timestamp of the change.
        #[prost(string, tag = "5")]
        pub occurred_at: String,
    }

    #[derive(
        Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration, serde::Serialize,
    )]
    #[repr(i32)]
    pub enum ChangeKind {
        Unspecified = 0,
        Insert = 1,
        Update = 2,
        Delete = 3,
    }

    impl ChangeKind {
        pub fn label(self) -> &'static str {
            match self {
                ChangeKind::Unspecified => "unspecified",
                ChangeKind::Insert => "insert",
                ChangeKind::Update => "update",
                ChangeKind::Delete => "delete",
            }
        }

        pub fn from_label(label: &str) -> Self {
            match label.to_ascii_lowercase().as_str() {
                "insert" | "created" => ChangeKind::Insert,
                "update" | "updated" => ChangeKind::Update,
                "delete" | "deleted" => ChangeKind::Delete,
                _ => ChangeKind::Unspecified,
            }
        }
    }

    impl ChangeEvent {
        pub fn change_kind(&self) -> ChangeKind {
            ChangeKind::try_from(self.kind).unwrap_or(ChangeKind::Unspecified)
        }
    }
}
