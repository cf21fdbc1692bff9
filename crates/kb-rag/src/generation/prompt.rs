//! Prompt templates for strategy generation and answer synthesis

use crate::types::RetrievedContext;

/// Number of contexts fed into answer synthesis
pub const ANSWER_CONTEXT_LIMIT: usize = 10;

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Prompt builder for strategy and synthesis prompts
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join non-empty context contents with a separator
    pub fn join_contexts<'a, I>(contexts: I) -> String
    where
        I: IntoIterator<Item = &'a RetrievedContext>,
    {
        contexts
            .into_iter()
            .map(|c| c.content.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Ask for 3-5 paraphrases, one per line
    pub fn expansion(query: &str) -> String {
        format!(
            r#"Please generate 3-5 semantically diverse variations of this database query to improve retrieval.
The variations should capture different ways of expressing the same information need, using different terms,
structures, or perspectives. Focus on database terminology, SQL constructs, and schema concepts.

QUERY: {query}

Provide ONLY the query variations as plain text, one per line. No explanations or additional text."#,
            query = query
        )
    }

    /// Ask for a hypothetical document that would answer the query
    pub fn hypothetical_document(query: &str) -> String {
        format!(
            r#"Create a hypothetical, ideal document that would perfectly answer this database-related query:

QUERY: {query}

Create a technical document that contains information that would be the perfect match for this query.
Include specific database concepts, table names, column names, relationships, and technical details that would be
relevant. Write as if this were an excerpt from an actual database documentation or SQL guide.

Respond with the hypothetical document only. Do not include any introductions or explanations."#,
            query = query
        )
    }

    pub fn relationship_analysis(table: &str, contexts: &[RetrievedContext]) -> String {
        format!(
            r#"Based on the following database documentation excerpts, provide a comprehensive analysis of all relationships for the '{table}' table.

DOCUMENTATION EXCERPTS:
{excerpts}

Please provide a detailed explanation of:
1. Primary key(s) of the '{table}' table
2. Foreign keys in '{table}' that reference other tables
3. Tables that have foreign keys referencing '{table}'
4. The complete relationship graph of '{table}'
5. Important notes about these relationships (e.g., cascade delete rules, indexing considerations)

Format your response as a technical but readable analysis with markdown formatting. Use bullet points and tables where appropriate.
If the information is not available in the provided documentation, clearly indicate what's missing."#,
            table = table,
            excerpts = Self::join_contexts(contexts)
        )
    }

    pub fn sql_optimization(sql: &str, contexts: &[RetrievedContext]) -> String {
        format!(
            r#"Analyze and optimize this SQL query. Respond with ONLY the optimized SQL and brief performance comments.

ORIGINAL SQL:
```sql
{sql}
```

SCHEMA INFORMATION:
{schema}

Provide:
1. Optimized SQL query with performance improvements
2. Brief comments (-- format) explaining key optimizations
3. Index recommendations as SQL comments

OPTIMIZED SQL:"#,
            sql = sql,
            schema = Self::join_contexts(contexts)
        )
    }

    /// Answer synthesis over the top contexts of a merged result
    pub fn answer(query: &str, contexts: &[RetrievedContext]) -> String {
        let documentation =
            Self::join_contexts(contexts.iter().take(ANSWER_CONTEXT_LIMIT));

        format!(
            r#"You are a SQL query assistant. Based on the retrieved database documentation below, provide ONLY SQL statements that answer the user's query.

USER QUERY: {query}

RETRIEVED DOCUMENTATION:
{documentation}

IMPORTANT INSTRUCTIONS:
1. Respond ONLY with SQL statements - no explanatory text
2. Use proper SQL syntax for the database system
3. Include table aliases for readability
4. Add appropriate WHERE clauses for filtering
5. Use meaningful column names in SELECT statements
6. If multiple queries are needed, separate them with semicolons
7. If user corrections appear in the documentation, prioritize those over general documentation
8. If the query cannot be answered with available schema information, respond with: "-- Insufficient schema information to generate SQL"

SQL Response:"#,
            query = query,
            documentation = documentation
        )
    }

    /// Answer used when no contexts were retrieved
    pub fn no_context_answer(query: &str, source_title: &str) -> String {
        format!(
            "I couldn't find relevant information in the {} knowledge base for your query: '{}'. \
             Please try rephrasing your question or check if the topic is covered in the documentation.",
            source_title.to_lowercase(),
            query
        )
    }

    /// Answer used when the generator fails but contexts exist
    pub fn fallback_answer(query: &str, contexts: &[RetrievedContext]) -> String {
        match contexts.first() {
            Some(first) => {
                let excerpt: String = first.content.chars().take(2000).collect();
                format!(
                    "Based on the available documentation, here's what I found for your query '{}':\n\n{}...",
                    query, excerpt
                )
            }
            None => format!(
                "I encountered an error while processing your query '{}'. Please try again or rephrase your question.",
                query
            ),
        }
    }

    pub fn relationship_fallback(table: &str, reason: &str) -> String {
        format!(
            "Unable to generate a relationship analysis for the '{}' table: {}",
            table, reason
        )
    }

    pub fn optimization_fallback(reason: &str) -> String {
        format!(
            "Unable to generate SQL optimization recommendations: {}",
            reason
        )
    }
}
