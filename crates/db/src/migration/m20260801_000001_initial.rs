//! Initial database migration.
//!
//! Creates all core tables, constraints, and indexes for the payment plan
//! lifecycle and reconciliation engine.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: POPULATION
        // ============================================================
        db.execute_unprepared(PROGRAM_CYCLES_SQL).await?;
        db.execute_unprepared(HOUSEHOLDS_SQL).await?;
        db.execute_unprepared(INDIVIDUALS_SQL).await?;

        // ============================================================
        // PART 2: FSPS AND RATES
        // ============================================================
        db.execute_unprepared(FSPS_SQL).await?;
        db.execute_unprepared(EXCHANGE_RATES_SQL).await?;

        // ============================================================
        // PART 3: PAYMENT PLANS AND PAYMENTS
        // ============================================================
        db.execute_unprepared(PAYMENT_PLANS_SQL).await?;
        db.execute_unprepared(DELIVERY_MECHANISM_ASSIGNMENTS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;

        // ============================================================
        // PART 4: ACCEPTANCE PROCESS
        // ============================================================
        db.execute_unprepared(ACCEPTANCE_THRESHOLDS_SQL).await?;
        db.execute_unprepared(APPROVAL_PROCESSES_SQL).await?;
        db.execute_unprepared(APPROVALS_SQL).await?;

        // ============================================================
        // PART 5: SPLITS
        // ============================================================
        db.execute_unprepared(PAYMENT_PLAN_SPLITS_SQL).await?;
        db.execute_unprepared(SPLIT_PAYMENTS_SQL).await?;

        // ============================================================
        // PART 6: VERIFICATIONS
        // ============================================================
        db.execute_unprepared(PAYMENT_VERIFICATIONS_SQL).await?;
        db.execute_unprepared(VERIFICATION_SUMMARIES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const PROGRAM_CYCLES_SQL: &str = r"
CREATE TABLE program_cycles (
    id UUID PRIMARY KEY,
    program_id UUID NOT NULL,
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'DRAFT'
        CHECK (status IN ('DRAFT', 'ACTIVE', 'FINISHED')),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_program_cycles_program ON program_cycles(program_id);
";

const HOUSEHOLDS_SQL: &str = r"
CREATE TABLE households (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    size INTEGER NOT NULL DEFAULT 0,
    admin_area_1 TEXT,
    admin_area_2 TEXT,
    admin_area_3 TEXT,
    is_withdrawn BOOLEAN NOT NULL DEFAULT FALSE,
    vulnerability_score NUMERIC(10, 3),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_households_admin_area_1 ON households(admin_area_1);
";

const INDIVIDUALS_SQL: &str = r"
CREATE TABLE individuals (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    household_id UUID NOT NULL REFERENCES households(id),
    full_name TEXT NOT NULL,
    birth_date DATE NOT NULL,
    sex TEXT NOT NULL CHECK (sex IN ('MALE', 'FEMALE')),
    is_head_of_household BOOLEAN NOT NULL DEFAULT FALSE,
    is_primary_collector BOOLEAN NOT NULL DEFAULT FALSE,
    account_data JSONB NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_individuals_household ON individuals(household_id);

-- At most one primary collector per household
CREATE UNIQUE INDEX uq_individuals_primary_collector
    ON individuals(household_id)
    WHERE is_primary_collector;
";

const FSPS_SQL: &str = r"
CREATE TABLE financial_service_providers (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const EXCHANGE_RATES_SQL: &str = r"
CREATE TABLE exchange_rates (
    id UUID PRIMARY KEY,
    currency_code TEXT NOT NULL,
    effective_date DATE NOT NULL,
    rate NUMERIC(18, 6) NOT NULL CHECK (rate > 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    UNIQUE (currency_code, effective_date)
);

CREATE INDEX idx_exchange_rates_lookup
    ON exchange_rates(currency_code, effective_date DESC);
";

const PAYMENT_PLANS_SQL: &str = r"
CREATE TABLE payment_plans (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL CHECK (status IN (
        'TP_OPEN', 'TP_LOCKED', 'TP_PROCESSING',
        'TP_RULE_ENGINE_WAIT', 'TP_RULE_ENGINE_RUN',
        'TP_RULE_ENGINE_COMPLETED', 'TP_RULE_ENGINE_ERROR',
        'DRAFT', 'OPEN', 'LOCKED', 'LOCKED_FSP',
        'IN_APPROVAL', 'IN_AUTHORIZATION', 'IN_REVIEW',
        'ACCEPTED', 'FINISHED'
    )),
    status_date TIMESTAMPTZ NOT NULL,
    background_action TEXT CHECK (background_action IN (
        'RULE_ENGINE_RUN', 'RULE_ENGINE_ERROR',
        'XLSX_EXPORTING', 'XLSX_EXPORT_ERROR',
        'XLSX_IMPORTING_ENTITLEMENTS', 'XLSX_IMPORTING_RECONCILIATION',
        'XLSX_IMPORT_ERROR',
        'EXCLUDING_BENEFICIARIES', 'EXCLUDE_BENEFICIARIES_ERROR',
        'SENDING_TO_PAYMENT_GATEWAY', 'SEND_TO_PAYMENT_GATEWAY_ERROR'
    )),
    build_status TEXT CHECK (build_status IN ('PENDING', 'BUILDING', 'FAILED', 'OK')),
    currency TEXT NOT NULL DEFAULT '',
    dispersion_start_date DATE,
    dispersion_end_date DATE,
    exchange_rate NUMERIC(18, 6),
    total_entitled_quantity NUMERIC(15, 2) NOT NULL DEFAULT 0,
    total_entitled_quantity_usd NUMERIC(15, 2) NOT NULL DEFAULT 0,
    total_delivered_quantity NUMERIC(15, 2) NOT NULL DEFAULT 0,
    total_delivered_quantity_usd NUMERIC(15, 2) NOT NULL DEFAULT 0,
    total_undelivered_quantity NUMERIC(15, 2) NOT NULL DEFAULT 0,
    total_undelivered_quantity_usd NUMERIC(15, 2) NOT NULL DEFAULT 0,
    male_children_count BIGINT NOT NULL DEFAULT 0,
    female_children_count BIGINT NOT NULL DEFAULT 0,
    male_adults_count BIGINT NOT NULL DEFAULT 0,
    female_adults_count BIGINT NOT NULL DEFAULT 0,
    total_households_count BIGINT NOT NULL DEFAULT 0,
    total_individuals_count BIGINT NOT NULL DEFAULT 0,
    is_follow_up BOOLEAN NOT NULL DEFAULT FALSE,
    source_plan_id UUID REFERENCES payment_plans(id),
    program_cycle_id UUID NOT NULL REFERENCES program_cycles(id),
    targeting_criteria_id UUID NOT NULL,
    fsp_id UUID REFERENCES financial_service_providers(id),
    delivery_mechanism TEXT,
    vulnerability_score_min NUMERIC(10, 3),
    vulnerability_score_max NUMERIC(10, 3),
    excluded_household_ids TEXT,
    exclusion_reason TEXT,
    export_file_name TEXT,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    -- FSP and delivery mechanism are jointly present or jointly absent
    CONSTRAINT chk_fsp_mechanism_pair CHECK (
        (fsp_id IS NULL) = (delivery_mechanism IS NULL)
    )
);

CREATE INDEX idx_payment_plans_cycle ON payment_plans(program_cycle_id);
CREATE INDEX idx_payment_plans_status ON payment_plans(status);
CREATE INDEX idx_payment_plans_source ON payment_plans(source_plan_id);
";

const DELIVERY_MECHANISM_ASSIGNMENTS_SQL: &str = r"
CREATE TABLE delivery_mechanism_assignments (
    id UUID PRIMARY KEY,
    plan_id UUID NOT NULL REFERENCES payment_plans(id),
    mechanism TEXT NOT NULL,
    fsp_id UUID REFERENCES financial_service_providers(id),
    order_index INTEGER NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),

    UNIQUE (plan_id, mechanism)
);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    plan_id UUID NOT NULL REFERENCES payment_plans(id),
    household_id UUID NOT NULL REFERENCES households(id),
    head_of_household_id UUID REFERENCES individuals(id),
    collector_id UUID NOT NULL REFERENCES individuals(id),
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN (
        'PENDING', 'DISTRIBUTION_SUCCESSFUL', 'DISTRIBUTION_PARTIAL',
        'NOT_DISTRIBUTED', 'TRANSACTION_ERRONEOUS', 'FORCE_FAILED'
    )),
    state TEXT NOT NULL DEFAULT 'ACTIVE'
        CHECK (state IN ('ACTIVE', 'EXCLUDED', 'CONFLICTED', 'REMOVED')),
    state_reason TEXT,
    currency TEXT NOT NULL DEFAULT '',
    entitlement_quantity NUMERIC(15, 2),
    entitlement_quantity_usd NUMERIC(15, 2),
    delivered_quantity NUMERIC(15, 2),
    delivered_quantity_usd NUMERIC(15, 2),
    delivery_date TIMESTAMPTZ,
    fsp_id UUID REFERENCES financial_service_providers(id),
    delivery_mechanism TEXT,
    has_valid_wallet BOOLEAN NOT NULL DEFAULT TRUE,
    signature TEXT,
    snapshot JSONB,
    source_payment_id UUID REFERENCES payments(id),
    split_id UUID,
    fsp_auth_code TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_payments_plan ON payments(plan_id);
CREATE INDEX idx_payments_household ON payments(household_id);
CREATE INDEX idx_payments_split ON payments(split_id);

-- A household appears at most once among a plan's active payments
CREATE UNIQUE INDEX uq_payments_active_household
    ON payments(plan_id, household_id)
    WHERE state = 'ACTIVE';
";

const ACCEPTANCE_THRESHOLDS_SQL: &str = r"
CREATE TABLE acceptance_thresholds (
    id UUID PRIMARY KEY,
    min_usd NUMERIC(15, 2),
    max_usd NUMERIC(15, 2),
    approval_count INTEGER NOT NULL DEFAULT 1 CHECK (approval_count > 0),
    authorization_count INTEGER NOT NULL DEFAULT 1 CHECK (authorization_count > 0),
    finance_release_count INTEGER NOT NULL DEFAULT 1 CHECK (finance_release_count > 0),
    priority INTEGER NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const APPROVAL_PROCESSES_SQL: &str = r"
CREATE TABLE approval_processes (
    id UUID PRIMARY KEY,
    payment_plan_id UUID NOT NULL UNIQUE REFERENCES payment_plans(id),
    approval_number_required INTEGER NOT NULL DEFAULT 1,
    authorization_number_required INTEGER NOT NULL DEFAULT 1,
    finance_release_number_required INTEGER NOT NULL DEFAULT 1,
    sent_for_approval_by UUID NOT NULL,
    sent_for_approval_date TIMESTAMPTZ NOT NULL,
    sent_for_authorization_date TIMESTAMPTZ,
    sent_for_finance_release_date TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const APPROVALS_SQL: &str = r"
CREATE TABLE approvals (
    id UUID PRIMARY KEY,
    approval_process_id UUID NOT NULL REFERENCES approval_processes(id),
    approval_type TEXT NOT NULL CHECK (approval_type IN (
        'APPROVAL', 'AUTHORIZATION', 'FINANCE_RELEASE', 'REJECT'
    )),
    created_by UUID NOT NULL,
    comment TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_approvals_process ON approvals(approval_process_id);
";

const PAYMENT_PLAN_SPLITS_SQL: &str = r"
CREATE TABLE payment_plan_splits (
    id UUID PRIMARY KEY,
    plan_id UUID NOT NULL REFERENCES payment_plans(id),
    split_type TEXT NOT NULL CHECK (split_type IN (
        'BY_RECORDS', 'BY_ADMIN_AREA_1', 'BY_ADMIN_AREA_2',
        'BY_ADMIN_AREA_3', 'BY_COLLECTOR', 'NO_SPLIT'
    )),
    chunk_size INTEGER,
    order_index INTEGER NOT NULL,
    sent_to_payment_gateway BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_payment_plan_splits_plan ON payment_plan_splits(plan_id);
";

const SPLIT_PAYMENTS_SQL: &str = r"
CREATE TABLE split_payments (
    id UUID PRIMARY KEY,
    split_id UUID NOT NULL REFERENCES payment_plan_splits(id),
    payment_id UUID NOT NULL REFERENCES payments(id),
    order_index INTEGER NOT NULL,

    UNIQUE (split_id, payment_id)
);
";

const PAYMENT_VERIFICATIONS_SQL: &str = r"
CREATE TABLE payment_verifications (
    id UUID PRIMARY KEY,
    payment_id UUID NOT NULL UNIQUE REFERENCES payments(id),
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN (
        'PENDING', 'RECEIVED', 'NOT_RECEIVED', 'RECEIVED_WITH_ISSUES'
    )),
    received_amount NUMERIC(15, 2),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const VERIFICATION_SUMMARIES_SQL: &str = r"
CREATE TABLE verification_summaries (
    id UUID PRIMARY KEY,
    plan_id UUID NOT NULL UNIQUE REFERENCES payment_plans(id),
    status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN (
        'PENDING', 'RECEIVED', 'NOT_RECEIVED', 'RECEIVED_WITH_ISSUES'
    )),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS verification_summaries CASCADE;
DROP TABLE IF EXISTS payment_verifications CASCADE;
DROP TABLE IF EXISTS split_payments CASCADE;
DROP TABLE IF EXISTS payment_plan_splits CASCADE;
DROP TABLE IF EXISTS approvals CASCADE;
DROP TABLE IF EXISTS approval_processes CASCADE;
DROP TABLE IF EXISTS acceptance_thresholds CASCADE;
DROP TABLE IF EXISTS payments CASCADE;
DROP TABLE IF EXISTS delivery_mechanism_assignments CASCADE;
DROP TABLE IF EXISTS payment_plans CASCADE;
DROP TABLE IF EXISTS exchange_rates CASCADE;
DROP TABLE IF EXISTS financial_service_providers CASCADE;
DROP TABLE IF EXISTS individuals CASCADE;
DROP TABLE IF EXISTS households CASCADE;
DROP TABLE IF EXISTS program_cycles CASCADE;
";
