pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS alarms (
    id uuid PRIMARY KEY,
    status text NOT NULL,
    criticality text NOT NULL,
    alarm_type text NOT NULL,
    lat float8 NULL,
    lon float8 NULL,
    chainage_id uuid NOT NULL,
    chainage_value float8 NOT NULL,
    created_by uuid NULL,
    incident_time timestamptz NOT NULL,
    created_at timestamptz NOT NULL,
    updated_at timestamptz NOT NULL
);
CREATE INDEX IF NOT EXISTS alarms_status_idx ON alarms (status);

CREATE TABLE IF NOT EXISTS alarm_assignments (
    id uuid PRIMARY KEY,
    alarm_id uuid NOT NULL REFERENCES alarms (id),
    responder_id uuid NOT NULL,
    supervisor_id uuid NULL,
    status text NOT NULL,
    assigned_at timestamptz NOT NULL,
    accepted_at timestamptz NULL,
    completed_at timestamptz NULL
);
CREATE INDEX IF NOT EXISTS alarm_assignments_alarm_idx ON alarm_assignments (alarm_id, assigned_at DESC);

CREATE TABLE IF NOT EXISTS alarm_logs (
    id uuid PRIMARY KEY,
    alarm_id uuid NOT NULL REFERENCES alarms (id),
    action text NOT NULL,
    actor_id uuid NULL,
    meta jsonb NOT NULL DEFAULT '{}'::jsonb,
    created_at timestamptz NOT NULL
);
CREATE INDEX IF NOT EXISTS alarm_logs_alarm_idx ON alarm_logs (alarm_id, created_at);

CREATE TABLE IF NOT EXISTS alarm_verifications (
    id uuid PRIMARY KEY,
    alarm_id uuid NOT NULL REFERENCES alarms (id),
    verified_by uuid NOT NULL,
    lat float8 NOT NULL,
    lon float8 NOT NULL,
    distance float8 NOT NULL,
    geo_mismatch boolean NOT NULL,
    remarks text NULL,
    verified_at timestamptz NOT NULL
);

CREATE TABLE IF NOT EXISTS verification_evidence (
    verification_id uuid NOT NULL REFERENCES alarm_verifications (id),
    position int4 NOT NULL,
    url text NOT NULL,
    evidence_type text NOT NULL,
    PRIMARY KEY (verification_id, position)
);
"#;

pub const SELECT_ALARM_FOR_UPDATE: &str = r#"
SELECT id, status, criticality, alarm_type, lat, lon, chainage_id, chainage_value,
       created_by, incident_time, created_at, updated_at
FROM alarms WHERE id = $1 FOR UPDATE;
"#;

pub const SELECT_ALARM: &str = r#"
SELECT id, status, criticality, alarm_type, lat, lon, chainage_id, chainage_value,
       created_by, incident_time, created_at, updated_at
FROM alarms WHERE id = $1;
"#;

pub const SELECT_ALARMS_BY_STATUS: &str = r#"
SELECT id, status, criticality, alarm_type, lat, lon, chainage_id, chainage_value,
       created_by, incident_time, created_at, updated_at
FROM alarms WHERE status = ANY($1) ORDER BY created_at;
"#;

pub const INSERT_ALARM: &str = r#"
INSERT INTO alarms (
    id, status, criticality, alarm_type, lat, lon, chainage_id, chainage_value,
    created_by, incident_time, created_at, updated_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12);
"#;

pub const UPDATE_ALARM_STATUS: &str = r#"
UPDATE alarms SET status = $2, updated_at = $3 WHERE id = $1;
"#;

pub const SELECT_ASSIGNMENT: &str = r#"
SELECT id, alarm_id, responder_id, supervisor_id, status, assigned_at, accepted_at, completed_at
FROM alarm_assignments WHERE id = $1;
"#;

pub const SELECT_ACTIVE_ASSIGNMENT: &str = r#"
SELECT id, alarm_id, responder_id, supervisor_id, status, assigned_at, accepted_at, completed_at
FROM alarm_assignments
WHERE alarm_id = $1 AND status IN ('PENDING', 'ACCEPTED')
ORDER BY assigned_at DESC
LIMIT 1;
"#;

pub const SELECT_ASSIGNMENTS_FOR_ALARM: &str = r#"
SELECT id, alarm_id, responder_id, supervisor_id, status, assigned_at, accepted_at, completed_at
FROM alarm_assignments WHERE alarm_id = $1 ORDER BY assigned_at;
"#;

pub const INSERT_ASSIGNMENT: &str = r#"
INSERT INTO alarm_assignments (
    id, alarm_id, responder_id, supervisor_id, status, assigned_at, accepted_at, completed_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
"#;

pub const UPDATE_ASSIGNMENT: &str = r#"
UPDATE alarm_assignments
SET status = $2,
    accepted_at = $3,
    completed_at = $4
WHERE id = $1;
"#;

pub const SUPERSEDE_OPEN_ASSIGNMENTS: &str = r#"
UPDATE alarm_assignments
SET status = 'SUPERSEDED',
    completed_at = $2
WHERE alarm_id = $1 AND status IN ('PENDING', 'ACCEPTED')
RETURNING id;
"#;

pub const INSERT_VERIFICATION: &str = r#"
INSERT INTO alarm_verifications (
    id, alarm_id, verified_by, lat, lon, distance, geo_mismatch, remarks, verified_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);
"#;

pub const INSERT_EVIDENCE: &str = r#"
INSERT INTO verification_evidence (verification_id, position, url, evidence_type)
VALUES ($1, $2, $3, $4);
"#;

pub const SELECT_VERIFICATIONS_FOR_ALARM: &str = r#"
SELECT id, alarm_id, verified_by, lat, lon, distance, geo_mismatch, remarks, verified_at
FROM alarm_verifications WHERE alarm_id = $1 ORDER BY verified_at;
"#;

pub const SELECT_EVIDENCE_FOR_VERIFICATION: &str = r#"
SELECT url, evidence_type FROM verification_evidence
WHERE verification_id = $1 ORDER BY position;
"#;

pub const INSERT_LOG: &str = r#"
INSERT INTO alarm_logs (id, alarm_id, action, actor_id, meta, created_at)
VALUES ($1, $2, $3, $4, $5, $6);
"#;

pub const SELECT_LOGS_FOR_ALARM: &str = r#"
SELECT id, alarm_id, action, actor_id, meta, created_at
FROM alarm_logs WHERE alarm_id = $1 ORDER BY created_at, id;
"#;

pub const SELECT_CHAINAGE_FOR_VALUE: &str = r#"
SELECT id, name, start_km, end_km FROM chainages
WHERE start_km <= $1 AND $1 <= end_km
ORDER BY start_km DESC
LIMIT 1;
"#;

pub const SELECT_USER_CHAINAGE_MAPPED: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM user_chainages WHERE user_id = $1 AND chainage_id = $2
);
"#;

pub const SELECT_USER_ROLE: &str = r#"
SELECT role FROM users WHERE id = $1;
"#;
