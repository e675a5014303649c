/**
 * Membership Oracle
 *
 * Answers access-control questions for (identity, room) pairs. The project
 * store is the single source of truth; nothing here caches its answers.
 *
 * # Implementations
 *
 * - `PgMembershipOracle` - reads the project store through a PostgreSQL pool
 * - `InMemoryMembershipOracle` - holds memberships in memory; used when no
 *   database is configured and by tests
 *
 * Membership means owner or member. Leadership means owner or admin and is
 * only consulted by authorization logic outside the join path.
 */

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use thiserror::Error;

use crate::shared::{ProjectId, RoomId, UserId};

/// Failure to reach or read the project store
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("project store query failed: {0}")]
    Backend(#[from] sqlx::Error),

    #[error("project store unavailable: {0}")]
    Unavailable(String),

    #[error("project store did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Access-control authority for rooms
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Whether `user` is the owner or a member of the room's project
    async fn is_member(&self, user: &UserId, room: &RoomId) -> Result<bool, OracleError>;

    /// Whether `user` is the owner or an admin of the room's project
    async fn is_leader(&self, user: &UserId, room: &RoomId) -> Result<bool, OracleError>;
}

/// Oracle backed by the PostgreSQL project store
#[derive(Clone)]
pub struct PgMembershipOracle {
    pool: PgPool,
}

const MEMBER_QUERY: &str = r#"
    SELECT EXISTS (
        SELECT 1 FROM projects p
        WHERE p.id = $1
          AND (p.owner_id = $2
               OR EXISTS (SELECT 1 FROM project_members m
                          WHERE m.project_id = p.id AND m.user_id = $2))
    )
"#;

const LEADER_QUERY: &str = r#"
    SELECT EXISTS (
        SELECT 1 FROM projects p
        WHERE p.id = $1
          AND (p.owner_id = $2
               OR EXISTS (SELECT 1 FROM project_admins a
                          WHERE a.project_id = p.id AND a.user_id = $2))
    )
"#;

impl PgMembershipOracle {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, query: &str, user: &UserId, project: &ProjectId) -> Result<bool, OracleError> {
        let found = sqlx::query_scalar::<_, bool>(query)
            .bind(project.as_str())
            .bind(user.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(found)
    }
}

#[async_trait]
impl MembershipOracle for PgMembershipOracle {
    async fn is_member(&self, user: &UserId, room: &RoomId) -> Result<bool, OracleError> {
        match room.project_id() {
            None => Ok(true),
            Some(project) => self.exists(MEMBER_QUERY, user, project).await,
        }
    }

    async fn is_leader(&self, user: &UserId, room: &RoomId) -> Result<bool, OracleError> {
        match room.project_id() {
            None => Ok(false),
            Some(project) => self.exists(LEADER_QUERY, user, project).await,
        }
    }
}

/// Membership of one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMembership {
    pub owner: UserId,
    pub members: HashSet<UserId>,
    pub admins: HashSet<UserId>,
}

impl ProjectMembership {
    pub fn new(owner: UserId) -> Self {
        Self {
            owner,
            members: HashSet::new(),
            admins: HashSet::new(),
        }
    }

    pub fn is_member(&self, user: &UserId) -> bool {
        &self.owner == user || self.members.contains(user)
    }

    pub fn is_leader(&self, user: &UserId) -> bool {
        &self.owner == user || self.admins.contains(user)
    }
}

/// Oracle holding project memberships in memory
#[derive(Debug, Default)]
pub struct InMemoryMembershipOracle {
    projects: RwLock<HashMap<ProjectId, ProjectMembership>>,
}

impl InMemoryMembershipOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a project owned by `owner`
    pub fn create_project(&self, project: ProjectId, owner: UserId) {
        self.write().insert(project, ProjectMembership::new(owner));
    }

    pub fn add_member(&self, project: &ProjectId, user: UserId) -> bool {
        self.update(project, |membership| membership.members.insert(user))
    }

    /// Remove a member; admins lose their flag with their membership
    pub fn remove_member(&self, project: &ProjectId, user: &UserId) -> bool {
        self.update(project, |membership| {
            membership.admins.remove(user);
            membership.members.remove(user)
        })
    }

    pub fn set_admin(&self, project: &ProjectId, user: UserId, admin: bool) -> bool {
        self.update(project, |membership| {
            if admin {
                membership.admins.insert(user)
            } else {
                membership.admins.remove(&user)
            }
        })
    }

    /// Hand ownership to an existing member; the old owner stays a member
    pub fn transfer_owner(&self, project: &ProjectId, new_owner: UserId) -> bool {
        self.update(project, |membership| {
            if !membership.members.contains(&new_owner) {
                return false;
            }
            let previous = std::mem::replace(&mut membership.owner, new_owner.clone());
            membership.members.remove(&new_owner);
            membership.members.insert(previous);
            true
        })
    }

    pub fn membership(&self, project: &ProjectId) -> Option<ProjectMembership> {
        self.read().get(project).cloned()
    }

    fn update(&self, project: &ProjectId, apply: impl FnOnce(&mut ProjectMembership) -> bool) -> bool {
        match self.write().get_mut(project) {
            Some(membership) => apply(membership),
            None => false,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ProjectId, ProjectMembership>> {
        self.projects.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ProjectId, ProjectMembership>> {
        self.projects.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MembershipOracle for InMemoryMembershipOracle {
    async fn is_member(&self, user: &UserId, room: &RoomId) -> Result<bool, OracleError> {
        let Some(project) = room.project_id() else {
            return Ok(true);
        };
        Ok(self
            .read()
            .get(project)
            .is_some_and(|membership| membership.is_member(user)))
    }

    async fn is_leader(&self, user: &UserId, room: &RoomId) -> Result<bool, OracleError> {
        let Some(project) = room.project_id() else {
            return Ok(false);
        };
        Ok(self
            .read()
            .get(project)
            .is_some_and(|membership| membership.is_leader(user)))
    }
}
