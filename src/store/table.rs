use std::fmt;
use std::str::FromStr;

use crate::store::StoreError;

/// The six tables reachable through the data-access surface. Identity tables
/// (accounts, sessions) are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Profiles,
    Posts,
    Comments,
    Likes,
    Follows,
    Friendships,
}

impl Table {
    pub const ALL: [Table; 6] = [
        Table::Profiles,
        Table::Posts,
        Table::Comments,
        Table::Likes,
        Table::Follows,
        Table::Friendships,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Profiles => "profiles",
            Table::Posts => "posts",
            Table::Comments => "comments",
            Table::Likes => "likes",
            Table::Follows => "follows",
            Table::Friendships => "friendships",
        }
    }

    /// Every column, in the order rows are returned.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Profiles => &[
                "id",
                "username",
                "full_name",
                "bio",
                "avatar_url",
                "created_at",
                "updated_at",
            ],
            Table::Posts => &[
                "id",
                "author_id",
                "content",
                "image_url",
                "created_at",
                "updated_at",
            ],
            Table::Comments => &["id", "post_id", "author_id", "content", "created_at"],
            Table::Likes => &["id", "post_id", "user_id", "created_at"],
            Table::Follows => &["id", "follower_id", "followee_id", "created_at"],
            Table::Friendships => &[
                "id",
                "user_id_1",
                "user_id_2",
                "status",
                "requester_id",
                "created_at",
                "updated_at",
            ],
        }
    }

    /// Columns a caller may supply on insert.
    pub fn insertable(&self) -> &'static [&'static str] {
        match self {
            Table::Profiles => &["id", "username", "full_name", "bio", "avatar_url"],
            Table::Posts => &["author_id", "content", "image_url"],
            Table::Comments => &["post_id", "author_id", "content"],
            Table::Likes => &["post_id", "user_id"],
            Table::Follows => &["follower_id", "followee_id"],
            Table::Friendships => &["user_id_1", "user_id_2", "requester_id"],
        }
    }

    /// Columns a caller may change on update. Anything else is immutable.
    pub fn updatable(&self) -> &'static [&'static str] {
        match self {
            Table::Profiles => &["username", "full_name", "bio", "avatar_url"],
            Table::Posts => &["content", "image_url"],
            Table::Friendships => &["status"],
            Table::Comments | Table::Likes | Table::Follows => &[],
        }
    }

    /// Whether the store mints the row id. Profiles take the caller identity.
    pub fn generates_id(&self) -> bool {
        !matches!(self, Table::Profiles)
    }

    pub fn has_updated_at(&self) -> bool {
        matches!(self, Table::Profiles | Table::Posts | Table::Friendships)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns().contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| StoreError::UnknownTable(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tables() {
        for table in Table::ALL {
            assert_eq!(table.name().parse::<Table>().unwrap(), table);
        }
    }

    #[test]
    fn rejects_identity_tables() {
        assert!(matches!(
            "accounts".parse::<Table>(),
            Err(StoreError::UnknownTable(_))
        ));
        assert!("sessions".parse::<Table>().is_err());
    }

    #[test]
    fn writable_columns_are_real_columns() {
        for table in Table::ALL {
            for col in table.insertable().iter().chain(table.updatable()) {
                assert!(table.has_column(col), "{}.{}", table, col);
            }
        }
    }

    #[test]
    fn ownership_columns_are_not_updatable() {
        assert!(!Table::Profiles.updatable().contains(&"id"));
        assert!(!Table::Posts.updatable().contains(&"author_id"));
        assert!(!Table::Friendships.updatable().contains(&"requester_id"));
        assert!(!Table::Friendships.insertable().contains(&"status"));
    }
}
