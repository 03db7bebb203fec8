/// Project model and the Project Repository
///
/// A project is a hash record plus several derived sets that must always agree
/// with it:
///
/// ```text
/// project:{id}            hash  id, title, description, owner, createdAt, updatedAt
/// project:{id}:team       set   member ids (always contains the owner)
/// project:{id}:stories    set   story ids
/// projects                set   every project id
/// user:{owner}:projects   set   projects owned by a user
/// user:{member}:member-of set   projects a user is a team member of
/// ```
///
/// Every write that touches more than one key goes through a single atomic
/// [`Batch`]. Writes to an existing project are guarded on its record so a
/// concurrent delete cannot leave half a project behind. Reads resolve member and owner ids into full [`User`] records
/// through the [`UserDirectory`].
///
/// # Example
///
/// ```no_run
/// use crewboard_shared::models::project::{NewProject, ProjectRepository};
/// use crewboard_shared::models::user::UserDirectory;
/// use crewboard_shared::store::MemoryStore;
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// # async fn example(owner: Uuid) -> Result<(), crewboard_shared::store::StorageError> {
/// let store = Arc::new(MemoryStore::new());
/// let projects = ProjectRepository::new(store.clone(), UserDirectory::new(store));
///
/// let project = projects
///     .create(NewProject {
///         title: "Sprint".to_string(),
///         description: "Q1 work".to_string(),
///         owner,
///         team: vec![],
///     })
///     .await?;
///
/// assert!(project.has_member(owner));
/// # Ok(())
/// # }
/// ```

use super::record::{parse_ids, Record};
use super::user::{User, UserDirectory};
use crate::store::{keys, Batch, Guard, KeyValueStore, StorageError, StoreResult};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Stored shape of a project (the `project:{id}` hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id.to_string()),
            ("title".to_string(), self.title.clone()),
            ("description".to_string(), self.description.clone()),
            ("owner".to_string(), self.owner.to_string()),
            ("createdAt".to_string(), self.created_at.to_rfc3339()),
            ("updatedAt".to_string(), self.updated_at.to_rfc3339()),
        ]
    }

    fn from_record(record: &Record<'_>) -> StoreResult<Self> {
        Ok(Self {
            id: record.uuid("id")?,
            title: record.string("title")?,
            description: record.string("description")?,
            owner: record.uuid("owner")?,
            created_at: record.timestamp("createdAt")?,
            updated_at: record.timestamp("updatedAt")?,
        })
    }
}

/// A project with owner and team resolved to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub owner: User,
    pub team: Vec<User>,
    pub stories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Whether `user_id` owns the project
    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner.id == user_id
    }

    /// Whether `user_id` is on the team
    pub fn has_member(&self, user_id: Uuid) -> bool {
        self.team.iter().any(|member| member.id == user_id)
    }

    /// Team member ids
    pub fn member_ids(&self) -> Vec<Uuid> {
        self.team.iter().map(|member| member.id).collect()
    }
}

/// Input for creating a project
///
/// `team` holds already-resolved user ids; the owner is added automatically.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub description: String,
    pub owner: Uuid,
    pub team: Vec<Uuid>,
}

/// Partial update of a project's editable fields
///
/// Only `Some` fields are written. Owner and team are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl ProjectUpdate {
    /// Field map merged into the record, stamped with `updated_at`
    fn into_fields(self, updated_at: DateTime<Utc>) -> Vec<(String, String)> {
        let mut fields = HashMap::new();
        if let Some(title) = self.title {
            fields.insert("title".to_string(), title);
        }
        if let Some(description) = self.description {
            fields.insert("description".to_string(), description);
        }
        fields.insert("updatedAt".to_string(), updated_at.to_rfc3339());
        fields.into_iter().collect()
    }
}

/// Keeps the project record and its derived sets consistent
#[derive(Clone)]
pub struct ProjectRepository {
    store: Arc<dyn KeyValueStore>,
    users: UserDirectory,
}

impl ProjectRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, users: UserDirectory) -> Self {
        Self { store, users }
    }

    /// Creates a project
    ///
    /// The record, the team set (seeded with the owner), the global index,
    /// the owner's index and every member's `member-of` index are written in
    /// one atomic batch. If the batch fails nothing is written.
    ///
    /// # Returns
    ///
    /// The new project with owner and team resolved to users
    pub async fn create(&self, data: NewProject) -> StoreResult<Project> {
        let now = Utc::now();
        let record = ProjectRecord {
            id: Uuid::new_v4(),
            title: data.title,
            description: data.description,
            owner: data.owner,
            created_at: now,
            updated_at: now,
        };

        let mut team = vec![record.owner];
        for member in data.team {
            if !team.contains(&member) {
                team.push(member);
            }
        }
        let project_id = record.id.to_string();

        let mut batch = Batch::new()
            .hash_set(keys::project_key(record.id), record.to_fields())
            .set_add(
                keys::project_team_key(record.id),
                team.iter().map(Uuid::to_string).collect(),
            )
            .set_add(keys::PROJECTS, vec![project_id.clone()])
            .set_add(keys::owned_projects_key(record.owner), vec![project_id.clone()]);
        for member in &team {
            batch = batch.set_add(keys::member_of_key(*member), vec![project_id.clone()]);
        }
        self.store.execute(batch).await?;

        tracing::debug!(
            project_id = %record.id,
            owner = %record.owner,
            team_size = team.len(),
            "Created project"
        );

        self.resolve(record, team, Vec::new()).await
    }

    /// Finds a project by ID
    ///
    /// # Returns
    ///
    /// `None` if no record exists, or if only a fragment without `id` and
    /// `owner` is left. Otherwise the project with owner and team resolved to
    /// users.
    pub async fn fetch_by_id(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let key = keys::project_key(id);
        let team_key = keys::project_team_key(id);
        let stories_key = keys::project_stories_key(id);

        let (fields, members, stories) = futures::try_join!(
            self.store.hash_get_all(&key),
            self.store.set_members(&team_key),
            self.store.set_members(&stories_key),
        )?;

        if fields.is_empty() {
            return Ok(None);
        }
        if !fields.contains_key("id") || !fields.contains_key("owner") {
            tracing::warn!(project_id = %id, "Ignoring partial project record");
            return Ok(None);
        }

        let record = ProjectRecord::from_record(&Record::new(&key, &fields))?;
        let team = parse_ids(&team_key, &members)?;

        self.resolve(record, team, stories).await.map(Some)
    }

    /// Lists the projects owned by a user
    ///
    /// Projects are resolved concurrently; ordering is not guaranteed.
    pub async fn fetch_by_owner_id(&self, owner: Uuid) -> StoreResult<Vec<Project>> {
        let key = keys::owned_projects_key(owner);
        let ids = parse_ids(&key, &self.store.set_members(&key).await?)?;
        self.fetch_many(&ids).await
    }

    /// Lists the projects whose team contains `user_id`
    ///
    /// Reads the user's `member-of` index, then keeps only projects whose
    /// resolved team still contains the user. Ids of projects that no longer
    /// exist are pruned from the index.
    pub async fn fetch_projects_by_user_id(&self, user_id: Uuid) -> StoreResult<Vec<Project>> {
        let key = keys::member_of_key(user_id);
        let ids = parse_ids(&key, &self.store.set_members(&key).await?)?;

        let resolved = try_join_all(ids.iter().map(|id| self.fetch_by_id(*id))).await?;

        let stale: Vec<String> = ids
            .iter()
            .zip(&resolved)
            .filter(|(_, project)| project.is_none())
            .map(|(id, _)| id.to_string())
            .collect();
        if !stale.is_empty() {
            tracing::debug!(user_id = %user_id, pruned = stale.len(), "Pruning stale member-of ids");
            self.store.set_remove(&key, &stale).await?;
        }

        Ok(resolved
            .into_iter()
            .flatten()
            .filter(|project| project.has_member(user_id))
            .collect())
    }

    /// Every id in the global project index
    pub async fn all_project_ids(&self) -> StoreResult<Vec<Uuid>> {
        parse_ids(keys::PROJECTS, &self.store.set_members(keys::PROJECTS).await?)
    }

    /// Merges the supplied fields into an existing record
    ///
    /// Never replaces the whole record and never touches owner or team.
    ///
    /// # Returns
    ///
    /// The refreshed project, or `None` if it does not exist. The merge only
    /// happens while the record exists, so a concurrent delete wins cleanly.
    pub async fn update_by_id(
        &self,
        id: Uuid,
        update: ProjectUpdate,
    ) -> StoreResult<Option<Project>> {
        let key = keys::project_key(id);
        let batch = Batch::new().hash_set(key.clone(), update.into_fields(Utc::now()));

        if !self.store.execute_if(Guard::exists(key), batch).await? {
            return Ok(None);
        }

        tracing::debug!(project_id = %id, "Updated project");
        self.fetch_by_id(id).await
    }

    /// Deletes a project and purges it from every index
    ///
    /// Deleting a project that does not exist is not an error.
    pub async fn delete_by_id(&self, id: Uuid, owner: Uuid) -> StoreResult<()> {
        let team_key = keys::project_team_key(id);
        let members = parse_ids(&team_key, &self.store.set_members(&team_key).await?)?;
        let project_id = id.to_string();

        let mut batch = Batch::new()
            .delete(vec![
                keys::project_key(id),
                keys::project_stories_key(id),
                team_key,
            ])
            .set_remove(keys::owned_projects_key(owner), vec![project_id.clone()])
            .set_remove(keys::PROJECTS, vec![project_id.clone()])
            .set_remove(keys::member_of_key(owner), vec![project_id.clone()]);
        for member in members.iter().filter(|m| **m != owner) {
            batch = batch.set_remove(keys::member_of_key(*member), vec![project_id.clone()]);
        }
        self.store.execute(batch).await?;

        tracing::debug!(project_id = %id, owner = %owner, "Deleted project");
        Ok(())
    }

    /// Adds members to the team (set union)
    ///
    /// Already-present members are a no-op. Nothing is written and `None` is
    /// returned if the project does not exist.
    pub async fn add_to_team(&self, id: Uuid, members: &[Uuid]) -> StoreResult<Option<Project>> {
        let project_id = id.to_string();
        let member_ids: Vec<String> = members.iter().map(Uuid::to_string).collect();

        let mut batch = Batch::new().set_add(keys::project_team_key(id), member_ids);
        for member in members {
            batch = batch.set_add(keys::member_of_key(*member), vec![project_id.clone()]);
        }

        if !self
            .store
            .execute_if(Guard::exists(keys::project_key(id)), batch)
            .await?
        {
            return Ok(None);
        }

        tracing::debug!(project_id = %id, added = members.len(), "Added team members");
        self.fetch_by_id(id).await
    }

    /// Removes a member from the team (set difference)
    ///
    /// Removing a non-member is a no-op.
    pub async fn remove_from_team(&self, id: Uuid, member: Uuid) -> StoreResult<Option<Project>> {
        let batch = Batch::new()
            .set_remove(keys::project_team_key(id), vec![member.to_string()])
            .set_remove(keys::member_of_key(member), vec![id.to_string()]);
        self.store.execute(batch).await?;

        tracing::debug!(project_id = %id, member = %member, "Removed team member");
        self.fetch_by_id(id).await
    }

    async fn fetch_many(&self, ids: &[Uuid]) -> StoreResult<Vec<Project>> {
        let projects = try_join_all(ids.iter().map(|id| self.fetch_by_id(*id))).await?;
        Ok(projects.into_iter().flatten().collect())
    }

    /// Resolves owner and team ids into users
    ///
    /// Members without a user record are skipped; a missing owner is corrupt.
    async fn resolve(
        &self,
        record: ProjectRecord,
        team: Vec<Uuid>,
        stories: Vec<String>,
    ) -> StoreResult<Project> {
        let (owner, members) = futures::try_join!(
            self.users.fetch_by_id(record.owner),
            try_join_all(team.iter().map(|id| self.users.fetch_by_id(*id))),
        )?;

        let owner = owner.ok_or_else(|| {
            StorageError::corrupt(
                keys::project_key(record.id),
                format!("owner {} has no user record", record.owner),
            )
        })?;

        Ok(Project {
            id: record.id,
            title: record.title,
            description: record.description,
            owner,
            team: members.into_iter().flatten().collect(),
            stories,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
