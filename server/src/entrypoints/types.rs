use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    find_badge, ActivityStatus, CommitInput, ProgressUpdate, UserProgress, WeeklyStat,
    EXPERIENCE_PER_LEVEL,
};
use utoipa::ToSchema;
use vibe_community_server::db::types::{
    LeaderboardRecord, RepositoryRecord, UserRecord, WeeklyStatRecord,
};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 100;

pub fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Records to skip for a zero-based page.
pub fn page_offset(page: u64, limit: u64) -> usize {
    usize::try_from(page.saturating_mul(limit)).unwrap_or(usize::MAX)
}

/// GitHub login rules: alphanumeric or single hyphens, no leading or trailing hyphen.
pub fn validate_login(login: &str) -> shared::Result<String> {
    let login = login.trim().trim_start_matches('@');
    let valid = !login.is_empty()
        && login.len() <= 39
        && !login.starts_with('-')
        && !login.ends_with('-')
        && !login.contains("--")
        && login.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(login.to_string())
    } else {
        Err(shared::Error::invalid(format!("invalid GitHub login: {login}")))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, ToSchema)]
#[aliases(PaginatedLeaderboardResponse = PaginatedResponse<LeaderboardResponse>)]
pub struct PaginatedResponse<T: Serialize> {
    pub records: Vec<T>,
    pub page: u64,
    pub total_pages: u64,
    pub limit: u64,
    pub total_records: u64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(records: Vec<T>, page: u64, limit: u64, total_records: u64) -> Self {
        let extra_page = if total_records % limit == 0 { 0 } else { 1 };
        let total_pages = (total_records / limit) + extra_page;
        Self {
            records,
            page,
            total_pages,
            limit,
            total_records,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct GithubMeta {
    login: String,
    name: Option<String>,
    image: String,
}

impl GithubMeta {
    pub fn new(login: String, name: Option<String>) -> Self {
        let image = format!("https://github.com/{}.png", login);
        Self { login, name, image }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BadgeResponse {
    pub id: String,
    pub title: String,
}

impl From<&String> for BadgeResponse {
    fn from(id: &String) -> Self {
        Self {
            id: id.clone(),
            title: find_badge(id)
                .map(|badge| badge.title.to_string())
                .unwrap_or_else(|| id.clone()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ProgressResponse {
    pub total_commits: u32,
    pub active_days: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub level: u32,
    pub experience: u32,
    pub experience_to_next_level: u32,
    pub badges: Vec<BadgeResponse>,
}

impl ProgressResponse {
    pub fn new(progress: &UserProgress, today: NaiveDate) -> Self {
        Self {
            total_commits: progress.total_commits,
            active_days: progress.active_days,
            current_streak: progress.effective_streak(today),
            longest_streak: progress.longest_streak,
            level: progress.level,
            experience: progress.experience,
            experience_to_next_level: EXPERIENCE_PER_LEVEL - progress.experience % EXPERIENCE_PER_LEVEL,
            badges: progress.badges.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VacationResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub user_id: u32,
    pub user: GithubMeta,
    pub progress: ProgressResponse,
    pub leaderboard_place: Option<u32>,
    pub telegram_linked: bool,
    pub vacation: Option<VacationResponse>,
    pub joined_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(record: UserRecord, progress: &UserProgress, place: Option<u32>, now: DateTime<Utc>) -> Self {
        let vacation = record.vacation().map(|vacation| VacationResponse {
            start: vacation.start,
            end: vacation.end,
            active: vacation.covers(now),
        });
        Self {
            user_id: record.id as u32,
            user: GithubMeta::new(record.login, record.full_name),
            progress: ProgressResponse::new(progress, now.date_naive()),
            leaderboard_place: place,
            telegram_linked: record.telegram_chat_id.is_some(),
            vacation,
            joined_at: record.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub login: String,
    pub full_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct VacationRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AddRepositoryRequest {
    /// `owner/name` or a github.com URL
    pub full_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RepositoryResponse {
    pub id: u32,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub url: String,
    pub status: String,
    pub last_commit_date: Option<DateTime<Utc>>,
    pub last_commit_sha: Option<String>,
    pub changes_summary: Option<String>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl From<RepositoryRecord> for RepositoryResponse {
    fn from(record: RepositoryRecord) -> Self {
        let status: ActivityStatus = record.status();
        Self {
            id: record.id as u32,
            url: format!("https://github.com/{}", record.full_name),
            owner: record.owner,
            name: record.name,
            full_name: record.full_name,
            status: status.to_string(),
            last_commit_date: record.last_commit_date,
            last_commit_sha: record.last_commit_sha,
            changes_summary: record.changes_summary,
            last_checked_at: record.last_checked_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardResponse {
    pub place: u32,
    pub user: GithubMeta,
    pub level: u32,
    pub experience: u32,
    pub total_commits: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub badges: u32,
}

impl LeaderboardResponse {
    pub fn new(place: u32, record: LeaderboardRecord, progress: &UserProgress, today: NaiveDate) -> Self {
        Self {
            place,
            user: GithubMeta::new(record.login, record.full_name),
            level: progress.level,
            experience: progress.experience,
            total_commits: progress.total_commits,
            current_streak: progress.effective_streak(today),
            longest_streak: progress.longest_streak,
            badges: progress.badges.len() as u32,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct WeeklyStatResponse {
    pub week: String,
    pub commit_count: u32,
    pub streak_days: u32,
}

impl From<WeeklyStatRecord> for WeeklyStatResponse {
    fn from(record: WeeklyStatRecord) -> Self {
        Self {
            week: record.week,
            commit_count: record.commit_count.max(0) as u32,
            streak_days: record.streak_days.max(0) as u32,
        }
    }
}

impl From<&WeeklyStat> for WeeklyStatResponse {
    fn from(stat: &WeeklyStat) -> Self {
        Self {
            week: stat.week.clone(),
            commit_count: stat.commit_count,
            streak_days: stat.streak_days,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CommitRequest {
    pub sha: String,
    pub author: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl From<CommitRequest> for CommitInput {
    fn from(request: CommitRequest) -> Self {
        Self {
            sha: request.sha,
            author: request.author,
            timestamp: request.timestamp,
            message: request.message,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct CommitBatchRequest {
    pub commits: Vec<CommitRequest>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub progress: ProgressResponse,
    pub new_badges: Vec<BadgeResponse>,
    pub weekly: Vec<WeeklyStatResponse>,
}

impl IngestResponse {
    pub fn new(update: &ProgressUpdate, today: NaiveDate) -> Self {
        Self {
            progress: ProgressResponse::new(&update.progress, today),
            new_badges: update.new_badges.iter().map(Into::into).collect(),
            weekly: update.weekly.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RepositoryStatusCount {
    pub active: u32,
    pub warning: u32,
    pub inactive: u32,
    pub pending: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Statistics {
    pub number_of_members: u32,
    pub number_of_repos: u32,
    pub repos_by_status: RepositoryStatusCount,
    pub total_commits: u64,
    pub total_experience: u64,
    pub top_member: Option<TopMember>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TopMember {
    pub user: GithubMeta,
    pub level: u32,
}

impl From<vibe_community_server::db::types::Statistics> for Statistics {
    fn from(value: vibe_community_server::db::types::Statistics) -> Self {
        let count = |value: Option<i64>| value.unwrap_or_default().max(0) as u32;
        Self {
            number_of_members: count(value.number_of_users),
            number_of_repos: count(value.number_of_repos),
            repos_by_status: RepositoryStatusCount {
                active: count(value.active_repos),
                warning: count(value.warning_repos),
                inactive: count(value.inactive_repos),
                pending: count(value.pending_repos),
            },
            total_commits: value.total_commits.unwrap_or_default().max(0) as u64,
            total_experience: value.total_experience.unwrap_or_default().max(0) as u64,
            top_member: value.top_login.map(|login| TopMember {
                user: GithubMeta::new(login, None),
                level: value.top_level.unwrap_or(1).max(0) as u32,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_up() {
        let page = PaginatedResponse::new(vec![1, 2], 1, 50, 101);
        assert_eq!(page.total_pages, 3);
        let page = PaginatedResponse::new(Vec::<u32>::new(), 1, 50, 0);
        assert_eq!(page.total_pages, 0);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1000)), MAX_LIMIT);
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
    }

    #[test]
    fn huge_page_does_not_overflow() {
        assert_eq!(page_offset(2, 50), 100);
        assert_eq!(page_offset(u64::MAX, MAX_LIMIT), usize::MAX);
        let page = PaginatedResponse::new(Vec::<u32>::new(), u64::MAX.saturating_add(1), 50, 3);
        assert_eq!(page.page, u64::MAX);
    }

    #[test]
    fn logins_follow_github_rules() {
        assert_eq!(validate_login("@octo-cat").unwrap(), "octo-cat");
        assert!(validate_login("").is_err());
        assert!(validate_login("-octocat").is_err());
        assert!(validate_login("octo--cat").is_err());
        assert!(validate_login("octo cat").is_err());
    }

    #[test]
    fn progress_response_reports_effective_streak() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let progress = UserProgress {
            current_streak: 5,
            longest_streak: 8,
            experience: 230,
            level: 3,
            badges: vec!["streak_7".to_string(), "legacy".to_string()],
            last_active_day: NaiveDate::from_ymd_opt(2024, 5, 10),
            ..Default::default()
        };
        let response = ProgressResponse::new(&progress, today);
        assert_eq!(response.current_streak, 0);
        assert_eq!(response.longest_streak, 8);
        assert_eq!(response.experience_to_next_level, 70);
        assert_eq!(
            response.badges,
            vec![
                BadgeResponse {
                    id: "streak_7".to_string(),
                    title: "Week Warrior".to_string()
                },
                BadgeResponse {
                    id: "legacy".to_string(),
                    title: "legacy".to_string()
                },
            ]
        );
    }
}
