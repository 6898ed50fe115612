//! Prompt builders for every model-facing pass. Instructions mirror the
//! production prompts: percentages come back as decimal fractions, missing
//! fields stay null, and replies are bare JSON (or a bare label for
//! classification) with no surrounding prose.

use crate::llm::insight::CaseStage;

pub(crate) const TRUNCATION_MARKER: &str = "\n\n[... text truncated ...]";

/// Cut document text to a character budget, marking the cut so the model
/// knows the tail is missing.
pub fn truncate_text(text: &str, budget: usize) -> String {
    if text.len() <= budget {
        return text.to_string();
    }
    let mut cut = budget;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &text[..cut], TRUNCATION_MARKER)
}

pub fn deal_extraction_prompt(document_text: &str, schema_json: &str) -> String {
    format!(
        "You are analyzing a commercial real estate investment memorandum. Extract all \
         relevant structured data from this document.\n\n\
         DOCUMENT TEXT:\n{document_text}\n\n---\n\n\
         Return a single JSON object conforming to this JSON Schema:\n\n{schema_json}\n\n\
         IMPORTANT INSTRUCTIONS:\n\
         1. Return ONLY valid JSON - no additional text, markdown formatting, or explanations\n\
         2. For numeric values, use numbers not strings (e.g., 25.11 not \"25.11%\")\n\
         3. For IRR, cap rate, and other percentage values, convert to decimal fractions (25.11% -> 0.2511)\n\
         4. If a field is not found in the document, use null\n\
         5. List every sponsor/operator firm named in the document under \"sponsors\", most prominent first; \
            leave the list empty if no sponsor is identified anywhere\n\
         6. Extract ALL principals mentioned in the document (especially from team and contact pages)\n\
         7. For deal_name, use the actual property/portfolio name, not generic terms\n\
         8. For internal_code, if not explicitly stated, create one based on the deal name (e.g., \"SPRINGDALE-001\")\n\
         9. Be thorough - this is a critical data extraction task\n\n\
         Return only the JSON object, nothing else."
    )
}

pub fn fund_extraction_prompt(document_text: &str, schema_json: &str) -> String {
    format!(
        "You are analyzing a real estate fund or investment-strategy presentation. Extract all \
         relevant structured data from this document.\n\n\
         DOCUMENT TEXT:\n{document_text}\n\n---\n\n\
         Return a single JSON object conforming to this JSON Schema:\n\n{schema_json}\n\n\
         IMPORTANT INSTRUCTIONS:\n\
         1. Return ONLY valid JSON - no additional text, markdown formatting, or explanations\n\
         2. Percentages (target IRR, management fee, carried interest, GP commitment) are decimal \
            fractions (2% -> 0.02, 20% -> 0.20)\n\
         3. If a field is not found in the document, use null\n\
         4. List every sponsor/GP firm named under \"sponsors\", most prominent first; leave the \
            list empty if no sponsor is identified anywhere\n\
         5. Target returns describe the STRATEGY, not a specific property - record them under \
            underwriting all the same\n\n\
         Return only the JSON object, nothing else."
    )
}

pub fn classification_prompt(text_sample: &str) -> String {
    format!(
        "Analyze this real estate investment document and classify it as one of two types:\n\n\
         1. DEAL DECK - A document about a SPECIFIC property or investment opportunity with:\n\
         \x20  - A specific property address or location\n\
         \x20  - Specific acquisition/purchase price\n\
         \x20  - Specific unit count or square footage\n\
         \x20  - Specific financial projections for that property\n\n\
         2. FUND/STRATEGY DECK - A document about an investment STRATEGY or FUND without a specific property:\n\
         \x20  - Describes investment thesis/approach\n\
         \x20  - Shows TARGET returns (not actual deal projections)\n\
         \x20  - Discusses deal CRITERIA (what they look for)\n\
         \x20  - May mention fund terms (management fee, carried interest, GP/LP structure)\n\
         \x20  - May show track record of past deals\n\
         \x20  - Does NOT have a specific property being offered\n\n\
         DOCUMENT TEXT:\n{text_sample}\n\n---\n\n\
         Based on the document above, respond with ONLY one word: either \"deal\" or \"fund\"\n\
         Nothing else - just the single word classification."
    )
}

pub fn insight_prompt(context_block: &str, document_excerpt: &str, stage: CaseStage) -> String {
    match stage {
        CaseStage::PreDecision => pre_decision_insight_prompt(context_block, document_excerpt),
        CaseStage::Committed => committed_insight_prompt(context_block, document_excerpt),
    }
}

fn pre_decision_insight_prompt(context_block: &str, document_excerpt: &str) -> String {
    format!(
        "You are an investment analyst generating an investment memo for a commercial real \
         estate deal. Analyze the following deal information and generate a memo with three \
         specific sections.\n\n\
         DEAL INFORMATION:\n---\n{context_block}\n\n\
         DOCUMENT EXCERPT:\n{document_excerpt}\n\n---\n\n\
         INSTRUCTIONS:\n\n\
         Generate a professional investment memo with EXACTLY these three sections:\n\n\
         ## Investment Thesis\n\n\
         Write 2-4 compelling bullet points that explain the VALUE CREATION strategy. Focus on \
         specific opportunities for value add, market dynamics that support the thesis, the \
         sponsor's edge, and why THIS deal at THIS time makes sense. Reference specific numbers \
         from the financials when possible.\n\n\
         ## Key Risks\n\n\
         Identify 4-6 SPECIFIC risks tied to this deal: financial risks (leverage, returns \
         sensitivity, exit cap rate assumptions), market risks, execution risks, sponsor risks, \
         and missing data points that create uncertainty. Use bold risk categories and be \
         quantitative where possible.\n\n\
         ## Open Questions\n\n\
         Generate 5-8 ACTIONABLE due diligence questions an investor should ask, starting with \
         strong verbs (Verify, Confirm, Review, Investigate). Cover the missing data fields \
         listed above, clarifications on the business plan, market research to validate \
         assumptions, and sponsor background checks.\n\n\
         CRITICAL REQUIREMENTS:\n\
         1. Return ONLY the markdown content for these three sections - no introduction, no conclusion\n\
         2. Start with ## Investment Thesis as the first line\n\
         3. Be SPECIFIC and reference the actual deal data - avoid generic statements\n\
         4. Use bullet points (- or *) for all items, with **bold** key phrases\n\
         5. Do NOT invent or hallucinate data - only use information provided above\n\
         6. If data is missing, acknowledge it in the Open Questions section\n\
         7. Total output should be 400-600 words\n\n\
         Generate the memo now:"
    )
}

fn committed_insight_prompt(context_block: &str, document_excerpt: &str) -> String {
    format!(
        "You are an investment analyst generating a portfolio monitoring memo for a COMMITTED \
         commercial real estate deal. This deal is already in the portfolio, so focus on \
         tracking execution and performance rather than evaluating whether to invest.\n\n\
         DEAL INFORMATION:\n---\n{context_block}\n\n\
         LATEST UPDATE DOCUMENT:\n{document_excerpt}\n\n---\n\n\
         INSTRUCTIONS:\n\n\
         Generate a portfolio monitoring memo with EXACTLY these three sections:\n\n\
         ## Execution Status\n\n\
         Write 3-5 bullet points summarizing WHERE WE ARE in the business plan execution: \
         current phase, key milestones achieved or missed since commitment, timeline updates, \
         and budget position. Reference specific numbers from the latest update when possible.\n\n\
         ## Current Risks & Concerns\n\n\
         Identify 4-6 ACTIVE risks that matter NOW for this portfolio asset: execution risks, \
         market changes since commitment, leasing/occupancy challenges, financial performance \
         versus projections, and sponsor performance issues. Use bold risk categories and be \
         specific about what has changed or what to monitor.\n\n\
         ## Action Items & Follow-Ups\n\n\
         Generate 5-8 SPECIFIC action items and questions to track, starting with strong verbs \
         (Monitor, Request, Schedule, Review, Track): next milestones to monitor, updates needed \
         from the sponsor, site visits or calls, and missing data that would help monitoring.\n\n\
         CRITICAL REQUIREMENTS:\n\
         1. Return ONLY the markdown content for these three sections - no introduction, no conclusion\n\
         2. Start with ## Execution Status as the first line\n\
         3. Be SPECIFIC and reference the actual deal data - avoid generic statements\n\
         4. Use bullet points (- or *) for all items, with **bold** key phrases\n\
         5. Do NOT invent data - only use information provided above\n\
         6. Total output should be 400-600 words\n\n\
         Generate the memo now:"
    )
}

pub fn transcript_prompt(transcript_text: &str, topic: &str, date: &str, schema_json: &str) -> String {
    format!(
        "Analyze this conversation transcript and extract structured insights.\n\n\
         Transcript Topic: {topic}\n\
         Date: {date}\n\n\
         Transcript:\n{transcript_text}\n\n\
         Return a single JSON object conforming to this JSON Schema:\n\n{schema_json}\n\n\
         Focus on:\n\
         - Concrete decisions and commitments\n\
         - Specific action items with clear assignees\n\
         - Deal-related risks and concerns\n\
         - Overall sentiment/tone of the conversation\n\n\
         IMPORTANT:\n\
         1. Return ONLY valid JSON - no additional text, markdown formatting, or explanations\n\
         2. If no items were found for a category, use an empty array\n\
         3. For action items without clear assignees, set assignee to null\n\
         4. For sentiment, choose one of: \"positive\", \"neutral\", or \"concerned\"\n\
         5. Be thorough - extract ALL relevant information from the transcript\n\n\
         Return only the JSON object, nothing else."
    )
}
