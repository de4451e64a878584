//! Centralized database schema definitions for the Mnemo store.
//!
//! Mnemo keeps all agent state in a single consolidated SQLite database
//! (`memory.db`). The context report must be computable from one consistent
//! snapshot, and the cross-entity cascade rules (soft SET NULL references to
//! projects, owned CASCADE rows under requests and sessions) only work
//! natively when every table lives in the same file.

pub const MEMORY_DB_NAME: &str = "memory.db";
pub const MEMORY_SCHEMA_VERSION: u32 = 3;

pub const MEMORY_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

// --- Ledger tables ---

pub const MEMORY_DB_SCHEMA_PROJECTS: &str = "
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        path TEXT NOT NULL UNIQUE,
        tech_stack TEXT NOT NULL DEFAULT '[]',
        last_accessed TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";

pub const MEMORY_DB_SCHEMA_MEMORIES: &str = "
    CREATE TABLE IF NOT EXISTS memories (
        id TEXT PRIMARY KEY,
        memory_type TEXT NOT NULL DEFAULT 'fact',
        category TEXT NOT NULL DEFAULT 'general',
        content TEXT NOT NULL,
        encrypted_content TEXT,
        is_encrypted INTEGER NOT NULL DEFAULT 0,
        importance INTEGER NOT NULL DEFAULT 5,
        project_id TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE SET NULL
    )
";

pub const MEMORY_DB_SCHEMA_TASKS: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL DEFAULT 'pending',
        priority INTEGER NOT NULL DEFAULT 5,
        project_id TEXT,
        parent_task_id TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        completed_at TEXT,
        FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE SET NULL,
        FOREIGN KEY(parent_task_id) REFERENCES tasks(id) ON DELETE SET NULL
    )
";

pub const MEMORY_DB_SCHEMA_USER_CONTEXT: &str = "
    CREATE TABLE IF NOT EXISTS user_context (
        context_key TEXT PRIMARY KEY,
        context_value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const MEMORY_DB_SCHEMA_SESSIONS: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL UNIQUE,
        working_directory TEXT NOT NULL DEFAULT '',
        started_at TEXT NOT NULL,
        ended_at TEXT,
        active INTEGER NOT NULL DEFAULT 1
    )
";

pub const MEMORY_DB_SCHEMA_CONVERSATIONS: &str = "
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
    )
";

// --- Vault tables ---

pub const MEMORY_DB_SCHEMA_SECRETS: &str = "
    CREATE TABLE IF NOT EXISTS secrets (
        id TEXT PRIMARY KEY,
        secret_type TEXT NOT NULL,
        name TEXT NOT NULL,
        encrypted_value TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        tags TEXT NOT NULL DEFAULT '[]',
        active INTEGER NOT NULL DEFAULT 1,
        expires_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(secret_type, name)
    )
";

pub const MEMORY_DB_SCHEMA_PREFERENCES: &str = "
    CREATE TABLE IF NOT EXISTS preferences (
        id TEXT PRIMARY KEY,
        category TEXT NOT NULL,
        key TEXT NOT NULL,
        encrypted_value TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(category, key)
    )
";

// --- Learning tables ---

pub const MEMORY_DB_SCHEMA_LEARNING_INTERESTS: &str = "
    CREATE TABLE IF NOT EXISTS learning_interests (
        id TEXT PRIMARY KEY,
        topic TEXT NOT NULL,
        why_interested TEXT NOT NULL DEFAULT '',
        sparked_by TEXT,
        status TEXT NOT NULL DEFAULT 'curious',
        priority INTEGER NOT NULL DEFAULT 5,
        insights_gained TEXT NOT NULL DEFAULT '[]',
        remaining_questions TEXT NOT NULL DEFAULT '[]',
        tags TEXT NOT NULL DEFAULT '[]',
        paused_from TEXT,
        last_explored_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const MEMORY_DB_SCHEMA_RESEARCH_REQUESTS: &str = "
    CREATE TABLE IF NOT EXISTS research_requests (
        id TEXT PRIMARY KEY,
        topic TEXT NOT NULL,
        search_queries TEXT NOT NULL DEFAULT '[]',
        why_researching TEXT,
        hoping_to_learn TEXT,
        priority TEXT NOT NULL DEFAULT 'medium',
        status TEXT NOT NULL DEFAULT 'pending',
        interest_id TEXT,
        project_id TEXT,
        requested_at TEXT NOT NULL,
        started_at TEXT,
        completed_at TEXT,
        expires_at TEXT NOT NULL,
        error_message TEXT,
        FOREIGN KEY(interest_id) REFERENCES learning_interests(id) ON DELETE SET NULL,
        FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE SET NULL
    )
";

pub const MEMORY_DB_SCHEMA_RESEARCH_RESULTS: &str = "
    CREATE TABLE IF NOT EXISTS research_results (
        id TEXT PRIMARY KEY,
        request_id TEXT NOT NULL,
        query_used TEXT NOT NULL,
        source_url TEXT NOT NULL,
        source_title TEXT NOT NULL DEFAULT '',
        snippet TEXT NOT NULL DEFAULT '',
        full_content TEXT,
        content_type TEXT NOT NULL DEFAULT 'article',
        relevance_score REAL,
        created_at TEXT NOT NULL,
        FOREIGN KEY(request_id) REFERENCES research_requests(id) ON DELETE CASCADE
    )
";

pub const MEMORY_DB_SCHEMA_LEARNING_INSIGHTS: &str = "
    CREATE TABLE IF NOT EXISTS learning_insights (
        id TEXT PRIMARY KEY,
        request_id TEXT,
        interest_id TEXT,
        topic TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        key_insights TEXT NOT NULL DEFAULT '[]',
        new_questions TEXT NOT NULL DEFAULT '[]',
        confidence_level TEXT NOT NULL DEFAULT 'medium',
        sources_used TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        FOREIGN KEY(request_id) REFERENCES research_requests(id) ON DELETE SET NULL,
        FOREIGN KEY(interest_id) REFERENCES learning_interests(id) ON DELETE SET NULL
    )
";

pub const MEMORY_DB_SCHEMA_LEARNING_SESSIONS: &str = "
    CREATE TABLE IF NOT EXISTS learning_sessions (
        id TEXT PRIMARY KEY,
        session_type TEXT NOT NULL DEFAULT 'autonomous',
        topic_chosen TEXT,
        choice_reason TEXT,
        status TEXT NOT NULL DEFAULT 'started',
        insights_count INTEGER NOT NULL DEFAULT 0,
        new_questions_count INTEGER NOT NULL DEFAULT 0,
        new_interests_sparked INTEGER NOT NULL DEFAULT 0,
        error_message TEXT,
        duration_seconds INTEGER,
        started_at TEXT NOT NULL,
        completed_at TEXT
    )
";

// --- Indexes ---

pub const MEMORY_DB_INDEX_MEMORIES_TYPE: &str =
    "CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type)";
pub const MEMORY_DB_INDEX_MEMORIES_IMPORTANCE: &str =
    "CREATE INDEX IF NOT EXISTS idx_memories_importance ON memories(importance)";
pub const MEMORY_DB_INDEX_MEMORIES_ACTIVE: &str =
    "CREATE INDEX IF NOT EXISTS idx_memories_active ON memories(active)";
pub const MEMORY_DB_INDEX_TASKS_STATUS: &str =
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)";
pub const MEMORY_DB_INDEX_SECRETS_TYPE: &str =
    "CREATE INDEX IF NOT EXISTS idx_secrets_type ON secrets(secret_type)";
pub const MEMORY_DB_INDEX_REQUESTS_STATUS: &str =
    "CREATE INDEX IF NOT EXISTS idx_research_requests_status ON research_requests(status)";
pub const MEMORY_DB_INDEX_RESULTS_REQUEST: &str =
    "CREATE INDEX IF NOT EXISTS idx_research_results_request ON research_results(request_id)";
pub const MEMORY_DB_INDEX_INTERESTS_STATUS: &str =
    "CREATE INDEX IF NOT EXISTS idx_learning_interests_status ON learning_interests(status)";
pub const MEMORY_DB_INDEX_INSIGHTS_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_learning_insights_created ON learning_insights(created_at)";
pub const MEMORY_DB_INDEX_CONVERSATIONS_SESSION: &str =
    "CREATE INDEX IF NOT EXISTS idx_conversations_session ON conversations(session_id)";

pub const MEMORY_DB_ALL_TABLES: &[&str] = &[
    MEMORY_DB_SCHEMA_META,
    MEMORY_DB_SCHEMA_PROJECTS,
    MEMORY_DB_SCHEMA_MEMORIES,
    MEMORY_DB_SCHEMA_TASKS,
    MEMORY_DB_SCHEMA_USER_CONTEXT,
    MEMORY_DB_SCHEMA_SESSIONS,
    MEMORY_DB_SCHEMA_CONVERSATIONS,
    MEMORY_DB_SCHEMA_SECRETS,
    MEMORY_DB_SCHEMA_PREFERENCES,
    MEMORY_DB_SCHEMA_LEARNING_INTERESTS,
    MEMORY_DB_SCHEMA_RESEARCH_REQUESTS,
    MEMORY_DB_SCHEMA_RESEARCH_RESULTS,
    MEMORY_DB_SCHEMA_LEARNING_INSIGHTS,
    MEMORY_DB_SCHEMA_LEARNING_SESSIONS,
];

pub const MEMORY_DB_ALL_INDEXES: &[&str] = &[
    MEMORY_DB_INDEX_MEMORIES_TYPE,
    MEMORY_DB_INDEX_MEMORIES_IMPORTANCE,
    MEMORY_DB_INDEX_MEMORIES_ACTIVE,
    MEMORY_DB_INDEX_TASKS_STATUS,
    MEMORY_DB_INDEX_SECRETS_TYPE,
    MEMORY_DB_INDEX_REQUESTS_STATUS,
    MEMORY_DB_INDEX_RESULTS_REQUEST,
    MEMORY_DB_INDEX_INTERESTS_STATUS,
    MEMORY_DB_INDEX_INSIGHTS_CREATED,
    MEMORY_DB_INDEX_CONVERSATIONS_SESSION,
];
