/// Schema for the study database.
///
/// The two UNIQUE indexes are the authoritative duplicate gates: the
/// application pre-checks are a fast path, but a racing second insert is
/// rejected here no matter what the callers saw.
pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS vignettes (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  category TEXT NOT NULL,
  patient_initials TEXT NOT NULL,
  content TEXT NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS llm_outputs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  vignette_id INTEGER NOT NULL REFERENCES vignettes(id),
  diagnoses TEXT NOT NULL,
  missing_information TEXT,
  model_name TEXT NOT NULL,
  temperature REAL NOT NULL,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  rater_id TEXT NOT NULL,
  vignette_id INTEGER NOT NULL REFERENCES vignettes(id),
  llm_output_id INTEGER NOT NULL REFERENCES llm_outputs(id),
  relevance_score INTEGER NOT NULL,
  missing_critical INTEGER NOT NULL,
  missing_diagnosis TEXT,
  safety_score INTEGER NOT NULL,
  acceptable INTEGER NOT NULL,
  ordering_score INTEGER NOT NULL,
  confidence_level INTEGER NOT NULL,
  comment TEXT,
  created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS rater_demographics (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  rater_id TEXT NOT NULL,
  years_of_practice INTEGER NOT NULL,
  practice_location TEXT NOT NULL,
  ai_clinical_reasoning_confidence INTEGER NOT NULL,
  ai_safety_concern INTEGER NOT NULL,
  ai_decision_support_willingness INTEGER NOT NULL,
  ai_concerns TEXT NOT NULL,
  phone_number TEXT,
  created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_evaluations_rater_vignette
  ON evaluations(rater_id, vignette_id);

CREATE UNIQUE INDEX IF NOT EXISTS idx_demographics_rater
  ON rater_demographics(rater_id);

CREATE INDEX IF NOT EXISTS idx_llm_outputs_vignette
  ON llm_outputs(vignette_id);

CREATE INDEX IF NOT EXISTS idx_evaluations_rater
  ON evaluations(rater_id);
"#;
