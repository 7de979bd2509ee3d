use std::collections::{HashMap, HashSet};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use codemates_db::models::FriendshipRow;
use codemates_types::api::{FriendEntry, FriendRequestCreate, FriendRequestResponse, FriendsOverview, PendingRequest};
use codemates_types::events::{ChangeKind, Table, TableChange};
use codemates_types::models::{FriendshipStatus, NotificationKind};

use crate::convert::{self, parse_id, parse_time, username_or_unknown};
use crate::error::{ApiError, ApiResult};
use crate::middleware::Claims;
use crate::realtime;
use crate::state::AppState;

/// Users on the other end of any of `user_id`'s edges, without duplicates.
pub fn counterpart_ids(user_id: &str, edges: &[FriendshipRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    edges
        .iter()
        .map(|e| if e.user_id == user_id { &e.friend_id } else { &e.user_id })
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Derive the friends list and inbound requests for `user_id` from every edge
/// that touches them. Accepted edges count in both directions; a pending edge
/// only shows up for its recipient.
pub fn resolve_friend_graph(
    user_id: &str,
    edges: &[FriendshipRow],
    usernames: &HashMap<String, String>,
    online: &HashSet<Uuid>,
) -> FriendsOverview {
    let mut seen = HashSet::new();
    let mut friends = Vec::new();
    let mut pending = Vec::new();

    for edge in edges {
        let status = edge.status.parse().unwrap_or(FriendshipStatus::Pending);
        match status {
            FriendshipStatus::Accepted => {
                let other = if edge.user_id == user_id { &edge.friend_id } else { &edge.user_id };
                if !seen.insert(other.clone()) {
                    continue;
                }
                let other_id = parse_id(other);
                friends.push(FriendEntry {
                    user_id: other_id,
                    username: username_or_unknown(usernames, other),
                    online: online.contains(&other_id),
                });
            }
            FriendshipStatus::Pending if edge.friend_id == user_id => {
                pending.push(PendingRequest {
                    id: parse_id(&edge.id),
                    from_user_id: parse_id(&edge.user_id),
                    username: username_or_unknown(usernames, &edge.user_id),
                    created_at: parse_time(&edge.created_at),
                });
            }
            FriendshipStatus::Pending => {}
        }
    }

    friends.sort_by(|a, b| a.username.cmp(&b.username).then(a.user_id.cmp(&b.user_id)));
    FriendsOverview { friends, pending }
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<FriendsOverview>> {
    let me = claims.sub.to_string();
    let (edges, usernames) = {
        let me = me.clone();
        state
            .run_db(move |db| {
                let edges = db.get_friendships_for_user(&me)?;
                // One batched lookup for every counterpart
                let usernames = db.get_usernames(&counterpart_ids(&me, &edges))?;
                Ok((edges, usernames))
            })
            .await?
    };

    let online: HashSet<Uuid> = state
        .dispatcher
        .online_users()
        .await
        .into_iter()
        .map(|(id, _)| id)
        .collect();

    Ok(Json(resolve_friend_graph(&me, &edges, &usernames, &online)))
}

pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendRequestCreate>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::bad_request("Please enter a username"));
    }

    let target = state
        .run_db(move |db| db.get_profile_by_username(&username))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let target_id = parse_id(&target.id);
    if target_id == claims.sub {
        return Err(ApiError::bad_request("You cannot add yourself as a friend"));
    }

    let me = claims.sub.to_string();
    let (outbound, inbound) = {
        let (me, them) = (me.clone(), target.id.clone());
        state
            .run_db(move |db| Ok((db.find_friendship(&me, &them)?, db.find_friendship(&them, &me)?)))
            .await?
    };
    check_no_existing_edge(outbound.as_ref(), inbound.as_ref())?;

    let row = {
        let (id, them) = (Uuid::new_v4().to_string(), target.id.clone());
        state
            .run_db(move |db| db.insert_friend_request(&id, &me, &them))
            .await
            .map_err(|e| e.on_unique_violation("Friend request already sent"))?
    };

    let sender = state.username_of(claims.sub).await?;
    info!("{} sent a friend request to {}", sender, target.username);
    realtime::publish(&state, friendship_change(&row, ChangeKind::Insert)).await;
    realtime::notify(
        &state,
        target_id,
        NotificationKind::FriendRequest,
        "New Friend Request",
        &format!("{} sent you a friend request", sender),
    )
    .await;

    Ok((StatusCode::CREATED, Json(convert::friend_request(&row))))
}

fn check_no_existing_edge(outbound: Option<&FriendshipRow>, inbound: Option<&FriendshipRow>) -> ApiResult<()> {
    let accepted = |e: &FriendshipRow| e.status == FriendshipStatus::Accepted.as_str();

    if outbound.is_some_and(accepted) || inbound.is_some_and(accepted) {
        return Err(ApiError::conflict("You are already friends"));
    }
    if outbound.is_some() {
        return Err(ApiError::conflict("Friend request already sent"));
    }
    if inbound.is_some() {
        return Err(ApiError::conflict("This user has already sent you a friend request"));
    }
    Ok(())
}

pub async fn accept_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<FriendRequestResponse>> {
    let request = load_inbound_request(&state, claims.sub, request_id).await?;

    let row = {
        let id = request.id.clone();
        state
            .run_db(move |db| {
                if !db.accept_friend_request(&id)? {
                    return Ok(None);
                }
                db.get_friendship(&id)
            })
            .await?
            .ok_or_else(|| ApiError::conflict("Friend request is no longer pending"))?
    };

    let accepter = state.username_of(claims.sub).await?;
    realtime::publish(&state, friendship_change(&row, ChangeKind::Update)).await;
    realtime::notify(
        &state,
        parse_id(&row.user_id),
        NotificationKind::FriendAccepted,
        "Friend Request Accepted",
        &format!("{} accepted your friend request", accepter),
    )
    .await;

    Ok(Json(convert::friend_request(&row)))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let request = load_inbound_request(&state, claims.sub, request_id).await?;

    let id = request.id.clone();
    if !state.run_db(move |db| db.delete_friendship(&id)).await? {
        return Err(ApiError::not_found("Friend request not found"));
    }

    realtime::publish(&state, friendship_change(&request, ChangeKind::Delete)).await;
    Ok(StatusCode::NO_CONTENT)
}

/// A pending request addressed to `me`. Only the recipient may respond.
async fn load_inbound_request(state: &AppState, me: Uuid, request_id: Uuid) -> ApiResult<FriendshipRow> {
    let id = request_id.to_string();
    let request = state
        .run_db(move |db| db.get_friendship(&id))
        .await?
        .ok_or_else(|| ApiError::not_found("Friend request not found"))?;

    if request.friend_id != me.to_string() {
        return Err(ApiError::forbidden("Only the recipient can respond to this request"));
    }
    if request.status != FriendshipStatus::Pending.as_str() {
        return Err(ApiError::conflict("Friend request is no longer pending"));
    }
    Ok(request)
}

pub async fn remove_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(friend_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let (me, them) = (claims.sub.to_string(), friend_id.to_string());
    let removed = state
        .run_db(move |db| db.delete_friendships_between(&me, &them))
        .await?;
    if removed.is_empty() {
        return Err(ApiError::not_found("You are not friends with this user"));
    }

    for row in &removed {
        realtime::publish(&state, friendship_change(row, ChangeKind::Delete)).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

fn friendship_change(row: &FriendshipRow, kind: ChangeKind) -> TableChange {
    let (from, to) = (parse_id(&row.user_id), parse_id(&row.friend_id));
    TableChange::new(Table::Friendships, kind, parse_id(&row.id))
        .column("user_id", from)
        .column("friend_id", to)
        .audience([from, to])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: &str, from: &str, to: &str, status: &str) -> FriendshipRow {
        FriendshipRow {
            id: id.to_string(),
            user_id: from.to_string(),
            friend_id: to.to_string(),
            status: status.to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    fn ids() -> (String, String, String) {
        (
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
        )
    }

    fn names(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(id, name)| (id.to_string(), name.to_string())).collect()
    }

    #[test]
    fn accepted_edge_is_symmetric() {
        let (a, b, _) = ids();
        let edges = vec![edge(&Uuid::new_v4().to_string(), &a, &b, "accepted")];
        let usernames = names(&[(a.as_str(), "alex_dev"), (b.as_str(), "sarah_codes")]);

        let for_a = resolve_friend_graph(&a, &edges, &usernames, &HashSet::new());
        let for_b = resolve_friend_graph(&b, &edges, &usernames, &HashSet::new());

        assert_eq!(for_a.friends.len(), 1);
        assert_eq!(for_a.friends[0].username, "sarah_codes");
        assert_eq!(for_b.friends.len(), 1);
        assert_eq!(for_b.friends[0].username, "alex_dev");
        assert!(for_a.pending.is_empty() && for_b.pending.is_empty());
    }

    #[test]
    fn pending_only_visible_to_recipient() {
        let (a, b, _) = ids();
        let edges = vec![edge(&Uuid::new_v4().to_string(), &a, &b, "pending")];
        let usernames = names(&[(a.as_str(), "alex_dev")]);

        let for_b = resolve_friend_graph(&b, &edges, &usernames, &HashSet::new());
        assert_eq!(for_b.pending.len(), 1);
        assert_eq!(for_b.pending[0].username, "alex_dev");
        assert!(for_b.friends.is_empty());

        let for_a = resolve_friend_graph(&a, &edges, &usernames, &HashSet::new());
        assert!(for_a.pending.is_empty());
        assert!(for_a.friends.is_empty());
    }

    #[test]
    fn rejected_request_disappears_from_pending() {
        let (a, b, _) = ids();
        let mut edges = vec![edge(&Uuid::new_v4().to_string(), &a, &b, "pending")];
        let usernames = names(&[(a.as_str(), "alex_dev")]);
        assert_eq!(resolve_friend_graph(&b, &edges, &usernames, &HashSet::new()).pending.len(), 1);

        // Rejection deletes the row
        edges.clear();
        assert!(resolve_friend_graph(&b, &edges, &usernames, &HashSet::new()).pending.is_empty());
    }

    #[test]
    fn friends_are_deduplicated_sorted_and_flag_presence() {
        let (a, b, c) = ids();
        let edges = vec![
            edge(&Uuid::new_v4().to_string(), &a, &c, "accepted"),
            edge(&Uuid::new_v4().to_string(), &b, &a, "accepted"),
            edge(&Uuid::new_v4().to_string(), &c, &a, "accepted"),
        ];
        // c has no profile
        let usernames = names(&[(b.as_str(), "Zed")]);
        let online: HashSet<Uuid> = [parse_id(&b)].into_iter().collect();

        let overview = resolve_friend_graph(&a, &edges, &usernames, &online);
        let listed: Vec<(&str, bool)> = overview
            .friends
            .iter()
            .map(|f| (f.username.as_str(), f.online))
            .collect();
        assert_eq!(listed, vec![("Unknown", false), ("Zed", true)]);
    }

    #[test]
    fn counterparts_cover_both_directions_once() {
        let (a, b, c) = ids();
        let edges = vec![
            edge("1", &a, &b, "accepted"),
            edge("2", &c, &a, "pending"),
            edge("3", &b, &a, "accepted"),
        ];
        assert_eq!(counterpart_ids(&a, &edges), vec![b, c]);
    }

    #[test]
    fn existing_edges_map_to_messages() {
        let (a, b, _) = ids();
        let pending_out = edge("1", &a, &b, "pending");
        let pending_in = edge("2", &b, &a, "pending");
        let accepted_in = edge("3", &b, &a, "accepted");

        let msg = |r: ApiResult<()>| r.unwrap_err().to_string();
        assert_eq!(msg(check_no_existing_edge(Some(&pending_out), None)), "Friend request already sent");
        assert_eq!(
            msg(check_no_existing_edge(None, Some(&pending_in))),
            "This user has already sent you a friend request"
        );
        assert_eq!(msg(check_no_existing_edge(None, Some(&accepted_in))), "You are already friends");
        assert!(check_no_existing_edge(None, None).is_ok());
    }
}
