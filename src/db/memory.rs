use std::{
    collections::HashMap,
    future::ready,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    db::{EventQuery, Store, StoreError, StoreResult, USERS_EMAIL_KEY, USERS_USERNAME_KEY},
    dto::{EventPatch, UserPatch},
    models::{Comment, Event, ReactionChange, Session, User, Vote},
};

#[derive(Default)]
struct Collections {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    events: HashMap<Uuid, Event>,
}

/// Process-local store. Every operation runs under a single lock, so each
/// call is atomic with respect to the others.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<Collections>,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run<'a, T: Send + 'a>(
        &'a self,
        op: impl FnOnce(&mut Collections) -> StoreResult<T>,
    ) -> BoxFuture<'a, StoreResult<T>> {
        let result = op(&mut self.lock());
        Box::pin(ready(result))
    }

    pub fn session_count(&self, user_id: Uuid) -> usize {
        self.lock()
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }
}

fn unique_violation(data: &Collections, candidate: &User) -> Option<&'static str> {
    data.users
        .values()
        .filter(|u| u.id != candidate.id)
        .find_map(|u| {
            if u.email == candidate.email {
                Some(USERS_EMAIL_KEY)
            } else if u.username == candidate.username {
                Some(USERS_USERNAME_KEY)
            } else {
                None
            }
        })
}

impl Store for MemoryStore {
    fn insert_user<'a>(&'a self, user: &'a User) -> BoxFuture<'a, StoreResult<()>> {
        self.run(|data| {
            if let Some(key) = unique_violation(data, user) {
                return Err(StoreError::Conflict(key.to_string()));
            }
            data.users.insert(user.id, user.clone());
            Ok(())
        })
    }

    fn find_user(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<User>>> {
        self.run(|data| Ok(data.users.get(&id).cloned()))
    }

    fn find_user_by_email<'a>(&'a self, email: &'a str) -> BoxFuture<'a, StoreResult<Option<User>>> {
        self.run(|data| Ok(data.users.values().find(|u| u.email == email).cloned()))
    }

    fn find_user_by_username<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<User>>> {
        self.run(|data| Ok(data.users.values().find(|u| u.username == username).cloned()))
    }

    fn find_users<'a>(&'a self, ids: &'a [Uuid]) -> BoxFuture<'a, StoreResult<Vec<User>>> {
        self.run(|data| Ok(ids.iter().filter_map(|id| data.users.get(id).cloned()).collect()))
    }

    fn update_user<'a>(&'a self, id: Uuid, patch: &'a UserPatch) -> BoxFuture<'a, StoreResult<bool>> {
        self.run(|data| {
            let Some(current) = data.users.get(&id) else {
                return Ok(false);
            };
            let mut updated = current.clone();
            patch.apply(&mut updated, Utc::now());
            if let Some(key) = unique_violation(data, &updated) {
                return Err(StoreError::Conflict(key.to_string()));
            }
            data.users.insert(id, updated);
            Ok(true)
        })
    }

    fn delete_user_cascade(&self, id: Uuid) -> BoxFuture<'_, StoreResult<()>> {
        self.run(|data| {
            for event in data.events.values_mut() {
                event.remove_user_engagement(id);
            }
            data.sessions.retain(|_, s| s.user_id != id);
            data.users.remove(&id);
            Ok(())
        })
    }

    fn insert_session<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, StoreResult<()>> {
        self.run(|data| {
            data.sessions
                .insert(session.token_hash.clone(), session.clone());
            Ok(())
        })
    }

    fn find_session<'a>(&'a self, token_hash: &'a str) -> BoxFuture<'a, StoreResult<Option<Session>>> {
        self.run(|data| Ok(data.sessions.get(token_hash).cloned()))
    }

    fn delete_session<'a>(&'a self, token_hash: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        self.run(|data| {
            data.sessions.remove(token_hash);
            Ok(())
        })
    }

    fn insert_event<'a>(&'a self, event: &'a Event) -> BoxFuture<'a, StoreResult<()>> {
        self.run(|data| {
            data.events.insert(event.id, event.clone());
            Ok(())
        })
    }

    fn find_event(&self, id: Uuid) -> BoxFuture<'_, StoreResult<Option<Event>>> {
        self.run(|data| Ok(data.events.get(&id).cloned()))
    }

    fn list_events<'a>(&'a self, query: &'a EventQuery) -> BoxFuture<'a, StoreResult<Vec<Event>>> {
        self.run(|data| {
            let mut events: Vec<Event> = data
                .events
                .values()
                .filter(|e| query.matches(e))
                .cloned()
                .collect();
            events.sort_by(|a, b| query.sort.compare(a, b));
            Ok(events)
        })
    }

    fn update_event<'a>(&'a self, id: Uuid, patch: &'a EventPatch) -> BoxFuture<'a, StoreResult<bool>> {
        self.run(|data| {
            Ok(match data.events.get_mut(&id) {
                Some(event) => {
                    patch.apply(event, Utc::now());
                    true
                }
                None => false,
            })
        })
    }

    fn delete_event(&self, id: Uuid) -> BoxFuture<'_, StoreResult<bool>> {
        self.run(|data| Ok(data.events.remove(&id).is_some()))
    }

    fn toggle_vote(
        &self,
        id: Uuid,
        user_id: Uuid,
        vote: Vote,
    ) -> BoxFuture<'_, StoreResult<Option<bool>>> {
        self.run(|data| {
            Ok(data.events.get_mut(&id).map(|event| {
                event.updated_at = Utc::now();
                event.toggle_vote(user_id, vote)
            }))
        })
    }

    fn react<'a>(
        &'a self,
        id: Uuid,
        user_id: Uuid,
        emoji: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<ReactionChange>>> {
        self.run(|data| {
            Ok(data.events.get_mut(&id).map(|event| {
                event.updated_at = Utc::now();
                event.react(user_id, emoji)
            }))
        })
    }

    fn push_comment<'a>(&'a self, id: Uuid, comment: &'a Comment) -> BoxFuture<'a, StoreResult<bool>> {
        self.run(|data| {
            Ok(match data.events.get_mut(&id) {
                Some(event) => {
                    event.comments.push(comment.clone());
                    event.updated_at = Utc::now();
                    true
                }
                None => false,
            })
        })
    }

    fn events_engaged_by(&self, user_id: Uuid) -> BoxFuture<'_, StoreResult<Vec<Event>>> {
        self.run(|data| {
            let mut events: Vec<Event> = data
                .events
                .values()
                .filter(|e| e.involves(user_id))
                .cloned()
                .collect();
            events.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
            Ok(events)
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(ready(()))
    }
}
